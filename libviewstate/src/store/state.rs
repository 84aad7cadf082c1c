//! Store state
//!
//! One immutable snapshot per dispatch cycle. The reducer builds the next
//! snapshot and the store swaps it in; readers keep whatever `Arc` they
//! already hold.

use std::collections::{HashMap, HashSet};

use crate::types::{AuthInfo, User};

/// Root store state
///
/// Auth info is keyed by the token it was fetched for, so a late answer for
/// a token that is no longer active lands in the map but never reaches the
/// derived context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    /// Token currently in use
    pub active_token: Option<String>,

    /// Resolved auth info per token
    pub auth_info: HashMap<String, AuthInfo>,

    /// Loaded users per UID
    pub users: HashMap<u64, User>,

    /// Tokens with an auth-info fetch in flight
    pub pending_auth_info: HashSet<String>,

    /// UIDs with a user fetch in flight
    pub pending_users: HashSet<u64>,

    /// Tokens whose auth-info fetch failed; not re-requested until the token is set again
    pub failed_auth_info: HashSet<String>,

    /// UIDs whose user fetch failed or came back empty
    pub failed_users: HashSet<u64>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Auth info resolved for the active token, if any.
    pub fn active_auth_info(&self) -> Option<&AuthInfo> {
        self.active_token
            .as_ref()
            .and_then(|token| self.auth_info.get(token))
    }
}
