//! Per-slot selection state and the transitions that keep the stores in
//! step with it.
//!
//! A slot's contact list is refetched exactly when its token or selected
//! group changes, and cleared when either becomes unset. Every entry point
//! that changes one of those calls [`Workspace::reload`].

use parking_lot::Mutex;
use tracing::info;

use crate::align::{align, AlignedPair};
use crate::kv::KeyValueStore;
use crate::model::ContactPerson;
use crate::remote::PeopleApi;
use crate::session::{selected_group_key, StoredSessions, TokenProvider};
use crate::slot::{PerSlot, Slot};
use crate::store::{ContactStore, FetchStatus, GroupStore};

pub const SHOW_IDENTICAL_KEY: &str = "showIdenticalContacts";

pub struct Workspace<A, K> {
    api: A,
    kv: K,
    sessions: StoredSessions<K>,
    contacts: ContactStore,
    groups: GroupStore,
    selected: Mutex<PerSlot<Option<String>>>,
    show_identical: Mutex<bool>,
    contacts_web_url: String,
}

impl<A: PeopleApi, K: KeyValueStore + Clone> Workspace<A, K> {
    /// Restore persisted selections. Expired sessions are signed out first.
    pub fn new(api: A, kv: K, contacts_web_url: &str) -> Self {
        let sessions = StoredSessions::new(kv.clone());
        for slot in sessions.expire_stale() {
            info!(slot = slot.number(), "session expired");
        }

        let selected = PerSlot::from_fn(|slot| {
            kv.get::<String>(&selected_group_key(slot))
                .filter(|group| !group.is_empty())
        });
        let show_identical = kv.get_bool(SHOW_IDENTICAL_KEY, false);

        Self {
            groups: GroupStore::load(&kv),
            contacts: ContactStore::new(),
            selected: Mutex::new(selected),
            show_identical: Mutex::new(show_identical),
            contacts_web_url: contacts_web_url.trim_end_matches('/').to_string(),
            api,
            kv,
            sessions,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn sessions(&self) -> &StoredSessions<K> {
        &self.sessions
    }

    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// The slot's token. An expired session signs the whole slot out.
    pub fn token(&self, slot: Slot) -> Option<String> {
        if self.sessions.is_expired(slot) {
            info!(slot = slot.number(), "session expired");
            self.sign_out(slot);
            return None;
        }
        self.sessions.token(slot)
    }

    pub fn selected_group(&self, slot: Slot) -> Option<String> {
        self.selected.lock()[slot].clone()
    }

    pub fn show_identical(&self) -> bool {
        *self.show_identical.lock()
    }

    pub fn set_show_identical(&self, show: bool) {
        *self.show_identical.lock() = show;
        self.kv.set_bool(SHOW_IDENTICAL_KEY, show);
    }

    /// Label used in prompts: the account's name, or a numbered fallback.
    pub fn account_label(&self, slot: Slot) -> String {
        self.groups
            .account_name(slot)
            .unwrap_or_else(|| format!("Google Account {}", slot.number()))
    }

    /// Load groups and the account name, then the selected group's contacts.
    pub async fn connect(&self, slot: Slot) -> FetchStatus {
        let Some(token) = self.token(slot) else {
            return FetchStatus::Skipped;
        };
        let (groups, _) = tokio::join!(
            self.groups
                .fetch_groups(&self.api, &self.sessions, slot, &token),
            self.groups
                .fetch_account_name(&self.api, &self.kv, slot, &token),
        );
        if groups.is_unauthorized() {
            self.contacts.clear(slot);
            return groups;
        }
        self.reload(slot).await
    }

    pub async fn select_group(&self, slot: Slot, group: Option<&str>) -> FetchStatus {
        let group = group.map(str::trim).filter(|g| !g.is_empty());
        match group {
            Some(group) => self.kv.set(&selected_group_key(slot), group),
            None => self.kv.remove(&selected_group_key(slot)),
        }
        self.selected.lock()[slot] = group.map(str::to_string);
        self.reload(slot).await
    }

    /// Refetch the slot's contacts, or clear them when the token or group
    /// is missing. A rejected token invalidates the session.
    pub async fn reload(&self, slot: Slot) -> FetchStatus {
        let (Some(token), Some(group)) = (self.token(slot), self.selected_group(slot)) else {
            self.contacts.clear(slot);
            return FetchStatus::Skipped;
        };

        let status = self
            .contacts
            .fetch_contacts(&self.api, slot, &token, &group)
            .await;
        if status.is_unauthorized() {
            self.sessions.invalidate(slot);
            self.contacts.clear(slot);
        }
        status
    }

    /// Connect the listed slots concurrently. Unlisted slots report
    /// `Skipped`.
    pub async fn connect_slots(&self, slots: &[Slot]) -> PerSlot<FetchStatus> {
        let connect = move |slot: Slot| async move {
            if slots.contains(&slot) {
                self.connect(slot).await
            } else {
                FetchStatus::Skipped
            }
        };
        let (one, two) = tokio::join!(connect(Slot::One), connect(Slot::Two));
        PerSlot::new(one, two)
    }

    pub fn sign_out(&self, slot: Slot) {
        self.sessions.sign_out(slot);
        self.selected.lock()[slot] = None;
        self.contacts.clear(slot);
        self.groups.clear(slot);
    }

    pub fn aligned(&self) -> Vec<AlignedPair> {
        align(
            &self.contacts.contacts(Slot::One),
            &self.contacts.contacts(Slot::Two),
        )
    }

    pub fn contacts_url(&self, slot: Slot) -> String {
        match self.sessions.auth_user(slot) {
            Some(user) => format!("{}/u/{}", self.contacts_web_url, user),
            None => self.contacts_web_url.clone(),
        }
    }

    pub fn person_url(&self, slot: Slot, contact: &ContactPerson) -> String {
        format!("{}/person/{}", self.contacts_url(slot), contact.person_id())
    }
}
