//! Google People API client using reqwest.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::model::{ContactGroup, ContactPerson};
use crate::remote::{
    ConnectionsPage, PeopleApi, PersonPayload, RemoteError, PAGE_SIZE, PERSON_FIELDS,
};

const GROUP_FIELDS: &str = "metadata,name";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupListResponse {
    #[serde(default)]
    contact_groups: Vec<ContactGroup>,
}

/// People API remote implementation
pub struct GooglePeopleClient {
    client: Client,
    base_url: String,
}

impl GooglePeopleClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn connections_url(&self) -> String {
        self.url(&format!(
            "people/me/connections?pageSize={}&personFields={}",
            PAGE_SIZE, PERSON_FIELDS
        ))
    }

    fn person_url(&self, resource_name: &str) -> String {
        self.url(&format!("{}?personFields={}", resource_name, PERSON_FIELDS))
    }

    fn update_url(&self, resource_name: &str, update_fields: &str) -> String {
        self.url(&format!(
            "{}:updateContact?updatePersonFields={}",
            resource_name, update_fields
        ))
    }

    /// Send with bearer auth and map non-success statuses to `RemoteError`.
    async fn send(&self, request: RequestBuilder, token: &str) -> Result<Response, RemoteError> {
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, RemoteError> {
        debug!(%url, "GET");
        read_json(self.send(self.client.get(url), token).await?).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl PeopleApi for GooglePeopleClient {
    async fn list_connections(
        &self,
        token: &str,
        page_token: Option<&str>,
    ) -> Result<ConnectionsPage, RemoteError> {
        let url = self.connections_url();
        debug!(%url, ?page_token, "GET");
        let mut request = self.client.get(&url);
        if let Some(cursor) = page_token {
            request = request.query(&[("pageToken", cursor)]);
        }
        read_json(self.send(request, token).await?).await
    }

    async fn get_person(
        &self,
        token: &str,
        resource_name: &str,
    ) -> Result<ContactPerson, RemoteError> {
        self.get_json(&self.person_url(resource_name), token).await
    }

    async fn create_contact(
        &self,
        token: &str,
        payload: &PersonPayload,
    ) -> Result<ContactPerson, RemoteError> {
        let url = self.url("people:createContact");
        debug!(%url, "POST");
        read_json(self.send(self.client.post(&url).json(payload), token).await?).await
    }

    async fn update_contact(
        &self,
        token: &str,
        resource_name: &str,
        payload: &PersonPayload,
        update_fields: &str,
    ) -> Result<ContactPerson, RemoteError> {
        let url = self.update_url(resource_name, update_fields);
        debug!(%url, "PATCH");
        read_json(self.send(self.client.patch(&url).json(payload), token).await?).await
    }

    async fn delete_contact(&self, token: &str, resource_name: &str) -> Result<(), RemoteError> {
        let url = self.url(&format!("{}:deleteContact", resource_name));
        debug!(%url, "DELETE");
        self.send(self.client.delete(&url), token).await?;
        Ok(())
    }

    async fn list_groups(&self, token: &str) -> Result<Vec<ContactGroup>, RemoteError> {
        let url = self.url(&format!("contactGroups?groupFields={}", GROUP_FIELDS));
        let response: GroupListResponse = self.get_json(&url, token).await?;
        Ok(response.contact_groups)
    }

    async fn get_me(&self, token: &str) -> Result<ContactPerson, RemoteError> {
        self.get_json(&self.url("people/me?personFields=names"), token)
            .await
    }
}
