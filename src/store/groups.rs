//! Contact groups and the account display name, per slot.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::kv::KeyValueStore;
use crate::model::ContactGroup;
use crate::remote::{PeopleApi, RemoteError};
use crate::session::{account_name_key, TokenProvider};
use crate::slot::{PerSlot, Slot};
use crate::store::FetchStatus;

#[derive(Debug, Default)]
struct SlotGroups {
    groups: Vec<ContactGroup>,
    account_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct GroupStore {
    slots: Mutex<PerSlot<SlotGroups>>,
}

impl GroupStore {
    /// Start with the account names persisted by earlier runs.
    pub fn load<K: KeyValueStore>(kv: &K) -> Self {
        let slots = PerSlot::from_fn(|slot| SlotGroups {
            groups: Vec::new(),
            account_name: kv.get(&account_name_key(slot)),
        });
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn groups(&self, slot: Slot) -> Vec<ContactGroup> {
        self.slots.lock()[slot].groups.clone()
    }

    pub fn account_name(&self, slot: Slot) -> Option<String> {
        self.slots.lock()[slot].account_name.clone()
    }

    pub fn clear(&self, slot: Slot) {
        self.slots.lock()[slot] = SlotGroups::default();
    }

    /// Match by resource name, then by label ignoring case.
    pub fn find_group(&self, slot: Slot, query: &str) -> Option<ContactGroup> {
        let query = query.trim();
        let slots = self.slots.lock();
        let groups = &slots[slot].groups;
        groups
            .iter()
            .find(|g| g.resource_name == query)
            .or_else(|| groups.iter().find(|g| g.name.eq_ignore_ascii_case(query)))
            .cloned()
    }

    /// A 401 drops the slot's session, account name, and groups. Any other
    /// failure leaves the current groups in place.
    pub async fn fetch_groups<A: PeopleApi, T: TokenProvider>(
        &self,
        api: &A,
        sessions: &T,
        slot: Slot,
        token: &str,
    ) -> FetchStatus {
        match api.list_groups(token).await {
            Ok(groups) => {
                let count = groups.len();
                self.slots.lock()[slot].groups = groups;
                info!(slot = slot.number(), count, "groups loaded");
                FetchStatus::Loaded(count)
            }
            Err(RemoteError::Unauthorized) => {
                warn!(slot = slot.number(), "group fetch unauthorized, dropping session");
                sessions.invalidate(slot);
                self.clear(slot);
                FetchStatus::Unauthorized
            }
            Err(err) => {
                warn!(slot = slot.number(), %err, "group fetch failed");
                FetchStatus::Failed
            }
        }
    }

    pub async fn fetch_account_name<A: PeopleApi, K: KeyValueStore>(
        &self,
        api: &A,
        kv: &K,
        slot: Slot,
        token: &str,
    ) -> Option<String> {
        let me = match api.get_me(token).await {
            Ok(me) => me,
            Err(err) => {
                warn!(slot = slot.number(), %err, "account name fetch failed");
                return None;
            }
        };

        let name = Some(me.display_name())
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if let Some(ref name) = name {
            kv.set(&account_name_key(slot), name);
        }
        self.slots.lock()[slot].account_name = name.clone();
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::remote::fake::{group, FakePeople};
    use crate::session::StoredSessions;

    fn api_with_groups() -> FakePeople {
        let api = FakePeople::default();
        api.state.lock().groups = vec![
            group("contactGroups/myContacts", "myContacts"),
            group("contactGroups/abc", "Family"),
        ];
        api.state.lock().me = Some("Alice Example".into());
        api
    }

    #[tokio::test]
    async fn fetch_groups_replaces_list() {
        let api = api_with_groups();
        let sessions = StoredSessions::new(MemoryStore::default());
        let store = GroupStore::default();

        let status = store.fetch_groups(&api, &sessions, Slot::Two, "tok").await;

        assert_eq!(status, FetchStatus::Loaded(2));
        assert_eq!(store.groups(Slot::Two).len(), 2);
        assert!(store.groups(Slot::One).is_empty());
        assert_eq!(
            store.find_group(Slot::Two, "family").unwrap().resource_name,
            "contactGroups/abc"
        );
        assert_eq!(
            store.find_group(Slot::Two, "contactGroups/myContacts").unwrap().name,
            "myContacts"
        );
        assert!(store.find_group(Slot::One, "family").is_none());
    }

    #[tokio::test]
    async fn unauthorized_group_fetch_invalidates_session() {
        let api = api_with_groups();
        let kv = MemoryStore::default();
        let sessions = StoredSessions::new(kv.clone());
        sessions.sign_in(Slot::One, "tok", None, None);
        let store = GroupStore::default();
        store.fetch_account_name(&api, &kv, Slot::One, "tok").await;
        store.fetch_groups(&api, &sessions, Slot::One, "tok").await;

        api.state.lock().fail_status = Some(401);
        let status = store.fetch_groups(&api, &sessions, Slot::One, "tok").await;

        assert_eq!(status, FetchStatus::Unauthorized);
        assert_eq!(sessions.token(Slot::One), None);
        assert_eq!(store.account_name(Slot::One), None);
        assert!(store.groups(Slot::One).is_empty());
        assert_eq!(kv.get_raw(&account_name_key(Slot::One)), None);
    }

    #[tokio::test]
    async fn other_failures_keep_groups() {
        let api = api_with_groups();
        let sessions = StoredSessions::new(MemoryStore::default());
        sessions.sign_in(Slot::One, "tok", None, None);
        let store = GroupStore::default();
        store.fetch_groups(&api, &sessions, Slot::One, "tok").await;

        api.state.lock().fail_status = Some(503);
        let status = store.fetch_groups(&api, &sessions, Slot::One, "tok").await;

        assert_eq!(status, FetchStatus::Failed);
        assert_eq!(store.groups(Slot::One).len(), 2);
        assert_eq!(sessions.token(Slot::One).as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn account_name_is_persisted() {
        let api = api_with_groups();
        let kv = MemoryStore::default();
        let store = GroupStore::default();

        let name = store.fetch_account_name(&api, &kv, Slot::One, "tok").await;

        assert_eq!(name.as_deref(), Some("Alice Example"));
        assert_eq!(api.calls(), vec!["me"]);
        let reloaded = GroupStore::load(&kv);
        assert_eq!(reloaded.account_name(Slot::One).as_deref(), Some("Alice Example"));
        assert_eq!(reloaded.account_name(Slot::Two), None);
    }
}
