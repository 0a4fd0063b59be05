//! User-level actions that combine a confirmation step with store writes.
//!
//! Two session-local sets are kept here. The in-flight set holds pending
//! creates, keyed `"{slot}-{name}"`, and suppresses a second submission
//! of the same one. The recency set holds names touched by a create,
//! sync or rename; those pairs stay visible while identical pairs are
//! hidden.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

use crate::align::{visible, AlignedPair};
use crate::diff::SyncPreview;
use crate::kv::KeyValueStore;
use crate::model::ContactPerson;
use crate::remote::PeopleApi;
use crate::slot::{Slot, SyncDirection};
use crate::workspace::Workspace;

/// Confirmation dialogs.
#[allow(async_fn_in_trait)]
pub trait Prompt {
    async fn confirm_delete(&self, contact_name: &str) -> bool;
    async fn confirm_sync(&self, preview: &SyncPreview) -> bool;
    /// New name for a pair currently called `current`; `None` cancels.
    async fn prompt_rename(&self, current: &str) -> Option<String>;
}

/// Transient user-facing messages.
pub trait Notifier {
    fn notify(&self, message: &str);
}

fn creating_key(slot: Slot, name: &str) -> String {
    let name = if name.is_empty() { "unknown" } else { name };
    format!("{}-{}", slot.number(), name)
}

/// Removes its key from the in-flight set when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<String>>, key: String) -> Option<Self> {
        let claimed = set.lock().insert(key.clone());
        claimed.then(|| Self { set, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

pub struct SyncOrchestrator<'w, A, K, P, N> {
    workspace: &'w Workspace<A, K>,
    prompt: P,
    notifier: N,
    creating: Mutex<HashSet<String>>,
    recent: Mutex<HashSet<String>>,
}

impl<'w, A, K, P, N> SyncOrchestrator<'w, A, K, P, N>
where
    A: PeopleApi,
    K: KeyValueStore + Clone,
    P: Prompt,
    N: Notifier,
{
    pub fn new(workspace: &'w Workspace<A, K>, prompt: P, notifier: N) -> Self {
        Self {
            workspace,
            prompt,
            notifier,
            creating: Mutex::new(HashSet::new()),
            recent: Mutex::new(HashSet::new()),
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn mark_recent(&self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.recent.lock().insert(name.to_string());
        }
    }

    #[cfg(test)]
    pub fn is_recent(&self, name: &str) -> bool {
        self.recent.lock().contains(name.trim())
    }

    #[cfg(test)]
    pub fn is_creating(&self, slot: Slot, name: &str) -> bool {
        self.creating.lock().contains(&creating_key(slot, name))
    }

    /// Copy `source` into `slot`'s selected group.
    pub async fn create_contact(
        &self,
        slot: Slot,
        source: &ContactPerson,
    ) -> Option<ContactPerson> {
        let ws = self.workspace;
        let token = ws.token(slot)?;
        let group = ws.selected_group(slot)?;
        let Some(_in_flight) = InFlight::claim(
            &self.creating,
            creating_key(slot, source.display_name()),
        ) else {
            debug!(slot = slot.number(), "create already in flight");
            return None;
        };

        let created = ws
            .contacts()
            .create_contact(ws.api(), slot, &token, source, &group)
            .await;

        self.mark_recent(source.display_name());
        if created.is_none() {
            self.notifier.notify(&format!(
                "Failed to create contact in account {}",
                slot.number()
            ));
        }
        created
    }

    /// Overwrite one side of a pair with the other after confirmation.
    pub async fn sync_contact(
        &self,
        source: &ContactPerson,
        target: &ContactPerson,
        direction: SyncDirection,
    ) -> Option<ContactPerson> {
        let ws = self.workspace;
        let target_slot = direction.target_slot();
        let token = ws.token(target_slot)?;

        let preview = SyncPreview::between(
            source,
            target,
            &ws.account_label(direction.source_slot()),
            &ws.account_label(target_slot),
        );
        if !self.prompt.confirm_sync(&preview).await {
            return None;
        }

        let updated = ws
            .contacts()
            .update_contact(ws.api(), target_slot, &token, target, source)
            .await;
        match updated {
            Some(ref contact) => self.mark_recent(contact.display_name()),
            None => self.notifier.notify("Failed to sync contact"),
        }
        updated
    }

    /// Give both sides of a pair a new name. Each side succeeds or fails
    /// on its own; the other is not rolled back. Returns the new name.
    pub async fn rename_both(&self, pair: &AlignedPair) -> Option<String> {
        let ws = self.workspace;
        let token1 = ws.token(Slot::One)?;
        let token2 = ws.token(Slot::Two)?;
        let rn1 = pair
            .contact1
            .as_ref()
            .map(|c| c.resource_name.as_str())
            .filter(|rn| !rn.is_empty())?;
        let rn2 = pair
            .contact2
            .as_ref()
            .map(|c| c.resource_name.as_str())
            .filter(|rn| !rn.is_empty())?;

        let answer = self.prompt.prompt_rename(&pair.name).await?;
        let new_name = answer.trim();
        if new_name.is_empty() || new_name == pair.name {
            return None;
        }

        let store = ws.contacts();
        let (one, two) = tokio::join!(
            store.rename_contact(ws.api(), Slot::One, &token1, rn1, new_name),
            store.rename_contact(ws.api(), Slot::Two, &token2, rn2, new_name),
        );
        for (slot, renamed) in [(Slot::One, one), (Slot::Two, two)] {
            if renamed.is_none() {
                self.notifier.notify(&format!(
                    "Failed to rename contact in account {}",
                    slot.number()
                ));
            }
        }

        self.mark_recent(new_name);
        Some(new_name.to_string())
    }

    pub async fn delete_contact(&self, slot: Slot, contact: &ContactPerson) -> bool {
        let ws = self.workspace;
        let Some(token) = ws.token(slot) else {
            return false;
        };
        if contact.resource_name.is_empty() {
            return false;
        }

        let label = match contact.display_name() {
            "" => "Unknown Contact",
            name => name,
        };
        if !self.prompt.confirm_delete(label).await {
            return false;
        }

        let deleted = ws
            .contacts()
            .delete_contact(ws.api(), slot, &token, &contact.resource_name)
            .await;
        if !deleted {
            self.notifier.notify("Failed to delete contact");
        }
        deleted
    }

    pub async fn refresh_contact(
        &self,
        slot: Slot,
        contact: &ContactPerson,
    ) -> Option<ContactPerson> {
        let ws = self.workspace;
        let token = ws.token(slot)?;
        let group = ws.selected_group(slot)?;
        if contact.resource_name.is_empty() {
            return None;
        }
        ws.contacts()
            .refresh_single_contact(ws.api(), slot, &token, &contact.resource_name, &group)
            .await
    }

    pub fn visible_pairs(&self) -> Vec<AlignedPair> {
        let recent = self.recent.lock().clone();
        visible(
            self.workspace.aligned(),
            self.workspace.show_identical(),
            &recent,
        )
    }
}
