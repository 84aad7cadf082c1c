//! Actions for the reducer pattern
//!
//! All state transitions are triggered by actions. The set of kinds is
//! closed: anything a caller sends that is not listed here deserializes into
//! [`Action::Unrecognized`], which the reducer treats as a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::{AuthInfo, User};

/// Actions that trigger state transitions
///
/// Actions are immutable data describing what happened. The reducer
/// (see `reducer.rs`) is responsible for applying them to state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// The access token in use changed; `None` signs out.
    SetActiveToken { token: Option<String> },

    /// Auth info for this token is needed. Emitted by reconciliation.
    WantAuthInfo { token: String },

    /// Auth info for `token` arrived. An empty object means no user.
    FetchedAuthInfo {
        token: String,
        #[serde(default)]
        auth_info: AuthInfo,
    },

    /// The user record for `uid` is needed. Emitted by reconciliation.
    WantUser { uid: u64 },

    /// The user record for `uid` arrived; `None` when the server has none.
    FetchedUser { uid: u64, user: Option<User> },

    /// A fetch started for a `Want*` action failed.
    FetchFailed { resource: Resource, message: String },

    /// Any kind this build does not know about.
    #[serde(other)]
    Unrecognized,
}

impl Action {
    /// Wire name of the action kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetActiveToken { .. } => "set_active_token",
            Action::WantAuthInfo { .. } => "want_auth_info",
            Action::FetchedAuthInfo { .. } => "fetched_auth_info",
            Action::WantUser { .. } => "want_user",
            Action::FetchedUser { .. } => "fetched_user",
            Action::FetchFailed { .. } => "fetch_failed",
            Action::Unrecognized => "unrecognized",
        }
    }

    pub fn set_active_token(token: Option<&str>) -> Self {
        Action::SetActiveToken {
            token: token.map(str::to_string),
        }
    }

    pub fn fetched_auth_info(token: &str, auth_info: AuthInfo) -> Self {
        Action::FetchedAuthInfo {
            token: token.to_string(),
            auth_info,
        }
    }

    pub fn fetched_user(uid: u64, user: Option<User>) -> Self {
        Action::FetchedUser { uid, user }
    }
}

/// What a failed fetch was for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    AuthInfo { token: String },
    User { uid: u64 },
}

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// An action as it was submitted to a store.
///
/// `seq` is strictly increasing across the whole process and is only meant
/// for ordering and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub seq: u64,
    /// Unix timestamp in milliseconds
    pub dispatched_at: i64,
    #[serde(flatten)]
    pub action: Action,
}

impl ActionRecord {
    pub fn new(action: Action) -> Self {
        Self {
            seq: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            dispatched_at: chrono::Utc::now().timestamp_millis(),
            action,
        }
    }
}
