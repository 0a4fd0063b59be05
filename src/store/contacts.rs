//! Contact lists per slot.
//!
//! Each list holds at most one entry per resource name and stays sorted
//! by lower-cased display name. The lock is only taken between awaits,
//! so a list is always written by whichever operation completes last.

use std::cmp::Ordering;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::model::{compare_by_name, sort_contacts, ContactPerson, Membership};
use crate::remote::{
    PeopleApi, PersonPayload, RemoteError, RENAME_UPDATE_FIELDS, SYNC_UPDATE_FIELDS,
};
use crate::slot::{PerSlot, Slot};
use crate::store::FetchStatus;

#[derive(Debug, Default)]
struct SlotContacts {
    contacts: Vec<ContactPerson>,
    loading: bool,
}

#[derive(Debug, Default)]
pub struct ContactStore {
    slots: Mutex<PerSlot<SlotContacts>>,
}

fn log_failure(slot: Slot, action: &str, err: &RemoteError) {
    match err {
        RemoteError::Conflict(_) => warn!(
            slot = slot.number(),
            "{} rejected: contact changed remotely, refresh before retrying", action
        ),
        _ => warn!(slot = slot.number(), %err, "{} failed", action),
    }
}

async fn collect_group_members<A: PeopleApi>(
    api: &A,
    token: &str,
    group: &str,
) -> Result<Vec<ContactPerson>, RemoteError> {
    let mut members = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = api.list_connections(token, page_token.as_deref()).await?;
        pages += 1;
        members.extend(page.connections.into_iter().filter(|c| c.in_group(group)));
        debug!(pages, members = members.len(), "fetched connections page");
        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => break,
        }
    }
    sort_contacts(&mut members);
    Ok(members)
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contacts(&self, slot: Slot) -> Vec<ContactPerson> {
        self.slots.lock()[slot].contacts.clone()
    }

    pub fn is_loading(&self, slot: Slot) -> bool {
        self.slots.lock()[slot].loading
    }

    pub fn clear(&self, slot: Slot) {
        self.slots.lock()[slot] = SlotContacts::default();
    }

    /// Entry whose trimmed display name is `name`. With duplicates the
    /// later entry wins, as in alignment.
    pub fn find_by_name(&self, slot: Slot, name: &str) -> Option<ContactPerson> {
        let name = name.trim();
        self.slots.lock()[slot]
            .contacts
            .iter()
            .rev()
            .find(|c| c.alignment_key() == Some(name))
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, slot: Slot, mut contacts: Vec<ContactPerson>) {
        sort_contacts(&mut contacts);
        self.slots.lock()[slot].contacts = contacts;
    }

    fn insert_sorted(&self, slot: Slot, contact: ContactPerson) {
        let mut slots = self.slots.lock();
        let list = &mut slots[slot].contacts;
        list.retain(|c| c.resource_name != contact.resource_name);
        let at = list.partition_point(|c| compare_by_name(c, &contact) != Ordering::Greater);
        list.insert(at, contact);
    }

    fn replace(&self, slot: Slot, contact: &ContactPerson, resort: bool) {
        let mut slots = self.slots.lock();
        let list = &mut slots[slot].contacts;
        for entry in list.iter_mut() {
            if entry.resource_name == contact.resource_name {
                *entry = contact.clone();
            }
        }
        if resort {
            sort_contacts(list);
        }
    }

    fn remove(&self, slot: Slot, resource_name: &str) {
        self.slots.lock()[slot]
            .contacts
            .retain(|c| c.resource_name != resource_name);
    }

    /// Replace the slot's list with every connection in `group`.
    ///
    /// An empty `group` does nothing. On failure the previous list stays.
    pub async fn fetch_contacts<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        group: &str,
    ) -> FetchStatus {
        if group.is_empty() {
            return FetchStatus::Skipped;
        }

        self.slots.lock()[slot].loading = true;
        let result = collect_group_members(api, token, group).await;

        let mut slots = self.slots.lock();
        let state = &mut slots[slot];
        state.loading = false;
        match result {
            Ok(contacts) => {
                let count = contacts.len();
                state.contacts = contacts;
                info!(slot = slot.number(), group, count, "contacts loaded");
                FetchStatus::Loaded(count)
            }
            Err(RemoteError::Unauthorized) => {
                warn!(slot = slot.number(), "contact fetch unauthorized");
                FetchStatus::Unauthorized
            }
            Err(err) => {
                log_failure(slot, "contact fetch", &err);
                FetchStatus::Failed
            }
        }
    }

    /// Create a copy of `source` in `group`.
    pub async fn create_contact<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        source: &ContactPerson,
        group: &str,
    ) -> Option<ContactPerson> {
        let payload = PersonPayload::for_create(source, group);
        match api.create_contact(token, &payload).await {
            Ok(mut created) => {
                // Membership can lag behind the create response.
                if !created.in_group(group) {
                    created.memberships.push(Membership::group(group));
                }
                info!(
                    slot = slot.number(),
                    resource = %created.resource_name,
                    "contact created"
                );
                self.insert_sorted(slot, created.clone());
                Some(created)
            }
            Err(err) => {
                log_failure(slot, "create", &err);
                None
            }
        }
    }

    pub async fn delete_contact<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        resource_name: &str,
    ) -> bool {
        match api.delete_contact(token, resource_name).await {
            Ok(()) => {
                info!(slot = slot.number(), resource = resource_name, "contact deleted");
                self.remove(slot, resource_name);
                true
            }
            Err(err) => {
                log_failure(slot, "delete", &err);
                false
            }
        }
    }

    /// Overwrite `target`'s fields with `source`'s. Fields `source` lacks
    /// are cleared on `target`.
    pub async fn update_contact<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        target: &ContactPerson,
        source: &ContactPerson,
    ) -> Option<ContactPerson> {
        if target.resource_name.is_empty() {
            warn!(slot = slot.number(), "update skipped: target has no resource name");
            return None;
        }

        let payload = PersonPayload::for_sync(target, source);
        match api
            .update_contact(token, &target.resource_name, &payload, SYNC_UPDATE_FIELDS)
            .await
        {
            Ok(updated) => {
                info!(
                    slot = slot.number(),
                    resource = %updated.resource_name,
                    "contact updated"
                );
                self.replace(slot, &updated, true);
                Some(updated)
            }
            Err(err) => {
                log_failure(slot, "update", &err);
                None
            }
        }
    }

    /// Re-read one contact. Drops it locally when it has left `group`.
    pub async fn refresh_single_contact<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        resource_name: &str,
        group: &str,
    ) -> Option<ContactPerson> {
        let fresh = match api.get_person(token, resource_name).await {
            Ok(person) => person,
            Err(err) => {
                log_failure(slot, "refresh", &err);
                return None;
            }
        };

        if !fresh.in_group(group) {
            info!(
                slot = slot.number(),
                resource = resource_name,
                "contact left the group"
            );
            self.remove(slot, resource_name);
            return None;
        }

        self.replace(slot, &fresh, true);
        Some(fresh)
    }

    /// Change only the name. The contact is re-read first for its etag.
    pub async fn rename_contact<A: PeopleApi>(
        &self,
        api: &A,
        slot: Slot,
        token: &str,
        resource_name: &str,
        new_name: &str,
    ) -> Option<ContactPerson> {
        let current = match api.get_person(token, resource_name).await {
            Ok(person) => person,
            Err(err) => {
                log_failure(slot, "rename fetch", &err);
                return None;
            }
        };

        let payload = PersonPayload::for_rename(&current, new_name);
        match api
            .update_contact(token, resource_name, &payload, RENAME_UPDATE_FIELDS)
            .await
        {
            Ok(renamed) => {
                info!(slot = slot.number(), resource = resource_name, "contact renamed");
                self.replace(slot, &renamed, false);
                Some(renamed)
            }
            Err(err) => {
                log_failure(slot, "rename", &err);
                None
            }
        }
    }
}
