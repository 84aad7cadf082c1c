//! Derived context handed to dependent views

use serde::{Deserialize, Serialize};

use super::state::StoreState;
use crate::types::{AuthInfo, User};

/// Read-only projection of [`StoreState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedContext {
    pub auth_info: Option<AuthInfo>,
    pub user: Option<User>,
    pub signed_in: bool,
}

/// Project the state into the context.
///
/// Only data resolved for the *active* token is visible. With a token but no
/// answer yet the context is optimistically signed in; an empty answer means
/// the token no longer identifies anyone.
pub fn derive(state: &StoreState) -> DerivedContext {
    let Some(token) = state.active_token.as_ref() else {
        return DerivedContext::default();
    };

    match state.auth_info.get(token) {
        None => DerivedContext {
            auth_info: None,
            user: None,
            signed_in: true,
        },
        Some(auth_info) if auth_info.is_empty() => DerivedContext::default(),
        Some(auth_info) => DerivedContext {
            auth_info: Some(auth_info.clone()),
            user: auth_info.uid.and_then(|uid| state.users.get(&uid).cloned()),
            signed_in: true,
        },
    }
}

/// Remembers the last context so unchanged ones are not re-announced.
#[derive(Debug, Clone)]
pub struct ContextDeriver {
    current: DerivedContext,
}

impl ContextDeriver {
    pub fn new(state: &StoreState) -> Self {
        Self {
            current: derive(state),
        }
    }

    pub fn current(&self) -> &DerivedContext {
        &self.current
    }

    /// Re-derive; `Some` only when the result differs from the previous one.
    pub fn update(&mut self, state: &StoreState) -> Option<DerivedContext> {
        let next = derive(state);
        if next == self.current {
            return None;
        }
        self.current = next.clone();
        Some(next)
    }
}
