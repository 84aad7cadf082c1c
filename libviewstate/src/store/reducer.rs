//! Pure reducer and reconciliation pass
//!
//! `reduce` is `(State, Action) -> State` with no I/O. `reconcile` looks at a
//! freshly reduced state and names the follow-up actions it implies; the
//! store queues those behind the current cycle.

use super::action::{Action, Resource};
use super::state::StoreState;

/// Apply one action.
///
/// Unrecognized actions return the state untouched.
pub fn reduce(state: StoreState, action: &Action) -> StoreState {
    let mut state = state;
    match action {
        Action::SetActiveToken { token } => {
            if let Some(token) = token {
                // Setting a token again is an explicit retry, for the auth
                // info and for the user it resolved to.
                state.failed_auth_info.remove(token);
                if let Some(uid) = state.auth_info.get(token).and_then(|info| info.uid) {
                    state.failed_users.remove(&uid);
                }
            }
            state.active_token = token.clone();
        }

        Action::WantAuthInfo { token } => {
            state.pending_auth_info.insert(token.clone());
        }

        Action::FetchedAuthInfo { token, auth_info } => {
            state.pending_auth_info.remove(token);
            state.failed_auth_info.remove(token);
            state.auth_info.insert(token.clone(), auth_info.clone());
        }

        Action::WantUser { uid } => {
            state.pending_users.insert(*uid);
        }

        Action::FetchedUser { uid, user } => {
            state.pending_users.remove(uid);
            match user {
                Some(user) => {
                    state.failed_users.remove(uid);
                    state.users.insert(*uid, user.clone());
                }
                None => {
                    state.failed_users.insert(*uid);
                }
            }
        }

        Action::FetchFailed { resource, .. } => match resource {
            Resource::AuthInfo { token } => {
                state.pending_auth_info.remove(token);
                state.failed_auth_info.insert(token.clone());
            }
            Resource::User { uid } => {
                state.pending_users.remove(uid);
                state.failed_users.insert(*uid);
            }
        },

        Action::Unrecognized => {}
    }
    state
}

/// Follow-up actions implied by `state`.
///
/// Asks for auth info when a token is active and nothing is known or pending
/// for it, then for the user named by that auth info. Each is asked for once:
/// the `Want*` action itself marks the fetch pending.
pub fn reconcile(state: &StoreState) -> Vec<Action> {
    let mut follow_ups = Vec::new();

    let Some(token) = state.active_token.as_ref() else {
        return follow_ups;
    };

    match state.auth_info.get(token) {
        None => {
            if !state.pending_auth_info.contains(token) && !state.failed_auth_info.contains(token) {
                follow_ups.push(Action::WantAuthInfo {
                    token: token.clone(),
                });
            }
        }
        Some(auth_info) => {
            if let Some(uid) = auth_info.uid {
                let known = state.users.contains_key(&uid)
                    || state.pending_users.contains(&uid)
                    || state.failed_users.contains(&uid);
                if !known {
                    follow_ups.push(Action::WantUser { uid });
                }
            }
        }
    }

    follow_ups
}
