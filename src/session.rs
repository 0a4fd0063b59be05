//! Bearer tokens per slot.
//!
//! The consent flow runs outside this program; `sign_in` records the
//! token it produced together with its expiry. An expired token reads as
//! absent and signs the slot out.

use time::OffsetDateTime;
use tracing::info;

use crate::kv::KeyValueStore;
use crate::slot::Slot;

/// Lifetime assumed when the issuer does not report one.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
/// Tokens are dropped this long before their real expiry.
const EXPIRY_MARGIN_MS: i128 = 60_000;

pub fn token_key(slot: Slot) -> String {
    format!("google_account{}_token", slot.number())
}

pub fn expiry_key(slot: Slot) -> String {
    format!("google_account{}_exp", slot.number())
}

pub fn auth_user_key(slot: Slot) -> String {
    format!("google_account{}_authuser", slot.number())
}

pub fn account_name_key(slot: Slot) -> String {
    format!("google_account{}_name", slot.number())
}

pub fn selected_group_key(slot: Slot) -> String {
    format!("selectedGroup{}", slot.number())
}

/// Supplies the bearer token for a slot and learns when it stopped working.
pub trait TokenProvider {
    fn token(&self, slot: Slot) -> Option<String>;
    fn auth_user(&self, slot: Slot) -> Option<String>;
    /// Called after the remote rejected the token.
    fn invalidate(&self, slot: Slot);
}

fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[derive(Clone)]
pub struct StoredSessions<K> {
    kv: K,
}

impl<K: KeyValueStore> StoredSessions<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn store(&self) -> &K {
        &self.kv
    }

    pub fn sign_in(
        &self,
        slot: Slot,
        token: &str,
        expires_in: Option<u64>,
        auth_user: Option<&str>,
    ) {
        let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let exp = now_millis() + i128::from(expires_in) * 1000 - EXPIRY_MARGIN_MS;
        self.kv.set(&token_key(slot), token);
        self.kv.set(&expiry_key(slot), &exp.to_string());
        if let Some(user) = auth_user {
            self.kv.set(&auth_user_key(slot), user);
        }
        info!(slot = slot.number(), "signed in");
    }

    /// Drop every session key for `slot`, including its selected group.
    pub fn sign_out(&self, slot: Slot) {
        for key in [
            token_key(slot),
            expiry_key(slot),
            auth_user_key(slot),
            account_name_key(slot),
            selected_group_key(slot),
        ] {
            self.kv.remove(&key);
        }
        info!(slot = slot.number(), "signed out");
    }

    /// Expiry in epoch milliseconds, if recorded.
    pub fn expires_at(&self, slot: Slot) -> Option<i128> {
        self.kv
            .get::<String>(&expiry_key(slot))
            .and_then(|raw| raw.parse().ok())
    }

    /// A missing expiry never expires.
    pub fn is_expired(&self, slot: Slot) -> bool {
        self.expires_at(slot)
            .map(|exp| exp <= now_millis())
            .unwrap_or(false)
    }

    pub fn account_name(&self, slot: Slot) -> Option<String> {
        self.kv.get(&account_name_key(slot))
    }

    /// Sign out every slot whose token has expired. Returns those slots.
    pub fn expire_stale(&self) -> Vec<Slot> {
        Slot::ALL
            .into_iter()
            .filter(|slot| {
                let expired = self.is_expired(*slot);
                if expired {
                    self.sign_out(*slot);
                }
                expired
            })
            .collect()
    }
}

impl<K: KeyValueStore> TokenProvider for StoredSessions<K> {
    fn token(&self, slot: Slot) -> Option<String> {
        if self.is_expired(slot) {
            self.sign_out(slot);
            return None;
        }
        self.kv.get(&token_key(slot))
    }

    fn auth_user(&self, slot: Slot) -> Option<String> {
        self.kv.get(&auth_user_key(slot))
    }

    fn invalidate(&self, slot: Slot) {
        self.kv.remove(&token_key(slot));
        self.kv.remove(&account_name_key(slot));
        info!(slot = slot.number(), "session invalidated");
    }
}
