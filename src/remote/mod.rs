//! Remote people-directory abstraction and the Google People API client.
//!
//! This module provides:
//! - `PeopleApi` trait for the request/response operations the stores need
//! - `GooglePeopleClient` implementation over HTTPS
//! - Write payloads and the error taxonomy shared by every implementation

pub mod google;

#[cfg(test)]
pub(crate) mod fake;

use serde::{Deserialize, Serialize};

use crate::model::{
    Address, Biography, Birthday, ContactGroup, ContactPerson, EmailAddress, Membership, Name,
    PhoneNumber,
};

/// Fields requested for every person read.
pub const PERSON_FIELDS: &str =
    "names,emailAddresses,phoneNumbers,photos,memberships,addresses,biographies,birthdays";

/// Fields replaced by a sync update.
pub const SYNC_UPDATE_FIELDS: &str =
    "names,emailAddresses,phoneNumbers,addresses,biographies,birthdays";

pub const RENAME_UPDATE_FIELDS: &str = "names";

pub const PAGE_SIZE: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authorization expired or revoked")]
    Unauthorized,
    #[error("stale etag, contact changed remotely: {0}")]
    Conflict(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Classify a non-success response.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            409 | 412 => RemoteError::Conflict(body),
            400 if body.contains("FAILED_PRECONDITION") => RemoteError::Conflict(body),
            _ => RemoteError::Api {
                status,
                message: body,
            },
        }
    }
}

/// One page of `people/me/connections`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsPage {
    #[serde(default)]
    pub connections: Vec<ContactPerson>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body for create and update calls.
///
/// Every collection is an `Option`: `None` leaves the field out of the
/// JSON, `Some(vec![])` sends an explicit empty list, which is how an
/// update clears a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<Name>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_addresses: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<Vec<PhoneNumber>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biographies: Option<Vec<Biography>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdays: Option<Vec<Birthday>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memberships: Option<Vec<Membership>>,
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn canonical_name(source: &ContactPerson) -> Option<Vec<Name>> {
    let name = source.display_name();
    (!name.is_empty()).then(|| vec![Name::display(name)])
}

fn copied_addresses(source: &ContactPerson) -> Vec<Address> {
    source
        .addresses
        .iter()
        .map(|a| Address {
            formatted_value: Some(a.formatted_value.clone().unwrap_or_default()),
        })
        .collect()
}

impl PersonPayload {
    /// New contact copied from `source` and placed in `group_resource_name`.
    /// Empty collections are left out.
    pub fn for_create(source: &ContactPerson, group_resource_name: &str) -> Self {
        Self {
            names: canonical_name(source),
            email_addresses: non_empty(source.email_addresses.clone()),
            phone_numbers: non_empty(source.phone_numbers.clone()),
            addresses: non_empty(copied_addresses(source)),
            biographies: non_empty(source.biographies.clone()),
            birthdays: non_empty(source.birthdays.clone()),
            memberships: Some(vec![Membership::group(group_resource_name)]),
            ..Default::default()
        }
    }

    /// Full-replace patch of `target` with the fields of `source`. Missing
    /// source fields become explicit empty lists. The target keeps its own
    /// name and memberships.
    pub fn for_sync(target: &ContactPerson, source: &ContactPerson) -> Self {
        Self {
            resource_name: Some(target.resource_name.clone()),
            etag: target.etag.clone(),
            names: canonical_name(target),
            email_addresses: Some(source.email_addresses.clone()),
            phone_numbers: Some(source.phone_numbers.clone()),
            addresses: Some(copied_addresses(source)),
            biographies: Some(source.biographies.clone()),
            birthdays: Some(source.birthdays.clone()),
            memberships: Some(target.memberships.clone()),
        }
    }

    /// Name-only patch built from a freshly fetched `current`.
    pub fn for_rename(current: &ContactPerson, new_name: &str) -> Self {
        Self {
            resource_name: Some(current.resource_name.clone()),
            etag: current.etag.clone(),
            names: Some(vec![Name::display(new_name)]),
            email_addresses: Some(current.email_addresses.clone()),
            phone_numbers: Some(current.phone_numbers.clone()),
            addresses: Some(current.addresses.clone()),
            biographies: Some(current.biographies.clone()),
            birthdays: None,
            memberships: Some(current.memberships.clone()),
        }
    }
}

/// Trait for people-directory implementations
#[allow(async_fn_in_trait)]
pub trait PeopleApi {
    /// One page of the authenticated user's connections
    async fn list_connections(
        &self,
        token: &str,
        page_token: Option<&str>,
    ) -> Result<ConnectionsPage, RemoteError>;

    /// Fetch a single contact by resource name
    async fn get_person(&self, token: &str, resource_name: &str)
        -> Result<ContactPerson, RemoteError>;

    async fn create_contact(
        &self,
        token: &str,
        payload: &PersonPayload,
    ) -> Result<ContactPerson, RemoteError>;

    /// Patch `resource_name`, replacing only `update_fields`
    async fn update_contact(
        &self,
        token: &str,
        resource_name: &str,
        payload: &PersonPayload,
        update_fields: &str,
    ) -> Result<ContactPerson, RemoteError>;

    async fn delete_contact(&self, token: &str, resource_name: &str) -> Result<(), RemoteError>;

    async fn list_groups(&self, token: &str) -> Result<Vec<ContactGroup>, RemoteError>;

    /// Profile of the authenticated user (names only)
    async fn get_me(&self, token: &str) -> Result<ContactPerson, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use serde_json::json;

    #[test]
    fn status_classification() {
        assert!(matches!(
            RemoteError::from_status(401, String::new()),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            RemoteError::from_status(412, String::new()),
            RemoteError::Conflict(_)
        ));
        assert!(matches!(
            RemoteError::from_status(400, "{\"status\":\"FAILED_PRECONDITION\"}".into()),
            RemoteError::Conflict(_)
        ));
        assert!(matches!(
            RemoteError::from_status(500, "boom".into()),
            RemoteError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn create_payload_omits_empty_fields_and_adds_group() {
        let source = with_emails(person("people/1", "Alice"), &["a@x.org"]);
        let payload = serde_json::to_value(PersonPayload::for_create(&source, "contactGroups/g"))
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "names": [{"displayName": "Alice", "givenName": "Alice"}],
                "emailAddresses": [{"value": "a@x.org"}],
                "memberships": [{"contactGroupMembership": {"contactGroupResourceName": "contactGroups/g"}}]
            })
        );
    }

    #[test]
    fn sync_payload_sends_empty_lists_for_missing_fields() {
        let target = in_group(
            with_emails(person("people/2", "Alice"), &["old@x.org"]),
            "contactGroups/g",
        );
        let source = person("people/1", "Alice");
        let payload = serde_json::to_value(PersonPayload::for_sync(&target, &source)).unwrap();
        assert_eq!(payload["emailAddresses"], json!([]));
        assert_eq!(payload["phoneNumbers"], json!([]));
        assert_eq!(payload["addresses"], json!([]));
        assert_eq!(payload["birthdays"], json!([]));
        assert_eq!(payload["biographies"], json!([]));
        assert_eq!(payload["etag"], json!("etag-people/2"));
        assert_eq!(payload["resourceName"], json!("people/2"));
        assert_eq!(
            payload["memberships"][0]["contactGroupMembership"]["contactGroupResourceName"],
            json!("contactGroups/g")
        );
    }

    #[test]
    fn sync_payload_keeps_target_name() {
        let target = person("people/2", "Alice");
        let source = person("people/1", " Alice ");
        let payload = serde_json::to_value(PersonPayload::for_sync(&target, &source)).unwrap();
        assert_eq!(payload["names"][0]["displayName"], json!("Alice"));
    }

    #[test]
    fn connections_page_tolerates_missing_fields() {
        let page: ConnectionsPage = serde_json::from_str("{}").unwrap();
        assert!(page.connections.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
