//! Per-slot state fed by the People API: contact lists and contact groups.
//!
//! Stores never raise. Remote failures are logged and reported through
//! sentinels (`Option`, `bool`, [`FetchStatus`]) so callers decide what
//! the user sees.

pub mod contacts;
pub mod groups;

pub use contacts::ContactStore;
pub use groups::GroupStore;

/// Outcome of a list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Preconditions missing; nothing was requested.
    Skipped,
    /// The list was replaced with this many entries.
    Loaded(usize),
    /// The request failed; the previous list is untouched.
    Failed,
    /// The token was rejected. The caller should invalidate the session.
    Unauthorized,
}

impl FetchStatus {
    pub fn is_unauthorized(self) -> bool {
        self == FetchStatus::Unauthorized
    }
}
