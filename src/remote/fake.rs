//! In-memory `PeopleApi` used by unit tests.

use parking_lot::Mutex;
use serde_json::Value;

use crate::model::{ContactGroup, ContactPerson, Name};
use crate::remote::{ConnectionsPage, PeopleApi, PersonPayload, RemoteError};

#[derive(Default)]
pub struct FakeState {
    pub people: Vec<ContactPerson>,
    pub groups: Vec<ContactGroup>,
    pub me: Option<String>,
    /// Connections per page; 0 serves everything in one page.
    pub page_size: usize,
    /// Page index whose request fails with a 500.
    pub fail_page: Option<usize>,
    /// Every call fails with this status.
    pub fail_status: Option<u16>,
    pub drop_membership_on_create: bool,
    pub calls: Vec<String>,
    pub payloads: Vec<Value>,
    next_id: usize,
}

#[derive(Default)]
pub struct FakePeople {
    pub state: Mutex<FakeState>,
}

impl FakePeople {
    pub fn with_people(people: Vec<ContactPerson>) -> Self {
        let fake = Self::default();
        fake.state.lock().people = people;
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.state.lock().payloads.last().cloned()
    }

    pub fn server_person(&self, resource_name: &str) -> Option<ContactPerson> {
        self.state
            .lock()
            .people
            .iter()
            .find(|p| p.resource_name == resource_name)
            .cloned()
    }

    fn begin(&self, call: String) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.fail_status {
            Some(status) => Err(RemoteError::from_status(status, "fake failure".into())),
            None => Ok(()),
        }
    }
}

fn not_found() -> RemoteError {
    RemoteError::from_status(404, "not found".into())
}

fn apply(person: &mut ContactPerson, payload: &PersonPayload, fields: &[&str]) {
    let wants = |field: &str| fields.contains(&field);
    if wants("names") {
        person.names = payload.names.clone().unwrap_or_default();
    }
    if wants("emailAddresses") {
        person.email_addresses = payload.email_addresses.clone().unwrap_or_default();
    }
    if wants("phoneNumbers") {
        person.phone_numbers = payload.phone_numbers.clone().unwrap_or_default();
    }
    if wants("addresses") {
        person.addresses = payload.addresses.clone().unwrap_or_default();
    }
    if wants("biographies") {
        person.biographies = payload.biographies.clone().unwrap_or_default();
    }
    if wants("birthdays") {
        person.birthdays = payload.birthdays.clone().unwrap_or_default();
    }
}

impl PeopleApi for FakePeople {
    async fn list_connections(
        &self,
        _token: &str,
        page_token: Option<&str>,
    ) -> Result<ConnectionsPage, RemoteError> {
        let page: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        self.begin(format!("list {}", page))?;
        tokio::task::yield_now().await;

        let state = self.state.lock();
        if state.fail_page == Some(page) {
            return Err(RemoteError::from_status(500, "backend error".into()));
        }
        let size = if state.page_size == 0 {
            state.people.len().max(1)
        } else {
            state.page_size
        };
        let start = page * size;
        let connections: Vec<_> = state.people.iter().skip(start).take(size).cloned().collect();
        let next_page_token = (start + size < state.people.len()).then(|| (page + 1).to_string());
        Ok(ConnectionsPage {
            connections,
            next_page_token,
        })
    }

    async fn get_person(
        &self,
        _token: &str,
        resource_name: &str,
    ) -> Result<ContactPerson, RemoteError> {
        self.begin(format!("get {}", resource_name))?;
        tokio::task::yield_now().await;
        self.server_person(resource_name).ok_or_else(not_found)
    }

    async fn create_contact(
        &self,
        _token: &str,
        payload: &PersonPayload,
    ) -> Result<ContactPerson, RemoteError> {
        self.begin("create".to_string())?;
        self.state.lock().payloads.push(serde_json::to_value(payload)?);
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        state.next_id += 1;
        let mut person = ContactPerson {
            resource_name: format!("people/new{}", state.next_id),
            etag: Some(format!("etag-new{}", state.next_id)),
            ..Default::default()
        };
        apply(
            &mut person,
            payload,
            &[
                "names",
                "emailAddresses",
                "phoneNumbers",
                "addresses",
                "biographies",
                "birthdays",
            ],
        );
        if !state.drop_membership_on_create {
            person.memberships = payload.memberships.clone().unwrap_or_default();
        }
        state.people.push(person.clone());
        Ok(person)
    }

    async fn update_contact(
        &self,
        _token: &str,
        resource_name: &str,
        payload: &PersonPayload,
        update_fields: &str,
    ) -> Result<ContactPerson, RemoteError> {
        self.begin(format!("update {} {}", resource_name, update_fields))?;
        self.state.lock().payloads.push(serde_json::to_value(payload)?);
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        let person = state
            .people
            .iter_mut()
            .find(|p| p.resource_name == resource_name)
            .ok_or_else(not_found)?;
        if payload.etag.is_some() && payload.etag != person.etag {
            return Err(RemoteError::from_status(
                400,
                "FAILED_PRECONDITION: etag mismatch".into(),
            ));
        }
        let fields: Vec<&str> = update_fields.split(',').collect();
        apply(person, payload, &fields);
        let revision = person.etag.clone().unwrap_or_default();
        person.etag = Some(format!("{}+", revision));
        Ok(person.clone())
    }

    async fn delete_contact(&self, _token: &str, resource_name: &str) -> Result<(), RemoteError> {
        self.begin(format!("delete {}", resource_name))?;
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let before = state.people.len();
        state.people.retain(|p| p.resource_name != resource_name);
        if state.people.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn list_groups(&self, _token: &str) -> Result<Vec<ContactGroup>, RemoteError> {
        self.begin("groups".to_string())?;
        Ok(self.state.lock().groups.clone())
    }

    async fn get_me(&self, _token: &str) -> Result<ContactPerson, RemoteError> {
        self.begin("me".to_string())?;
        let me = self.state.lock().me.clone();
        Ok(ContactPerson {
            resource_name: "people/me".into(),
            names: me.map(|n| vec![Name::display(&n)]).unwrap_or_default(),
            ..Default::default()
        })
    }
}

pub fn group(resource_name: &str, name: &str) -> ContactGroup {
    ContactGroup {
        resource_name: resource_name.to_string(),
        name: name.to_string(),
    }
}
