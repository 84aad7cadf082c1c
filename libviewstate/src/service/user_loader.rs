//! Effect runner for auth info and user records
//!
//! Reconciliation only asks: it queues `WantAuthInfo` / `WantUser` actions.
//! The loader answers by fetching through the memoized caches and
//! dispatching `FetchedAuthInfo`, `FetchedUser` or `FetchFailed`.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::events::{EventReceiver, StoreEvent};
use crate::cache::{AuthInfoKey, ObservableCache, UserKey};
use crate::fetch::FetchPipeline;
use crate::store::{Action, Resource, Store};
use crate::types::{AuthInfo, User};

#[derive(Clone)]
pub struct UserLoader {
    store: Store,
    pipeline: FetchPipeline,
    auth_cache: ObservableCache<AuthInfoKey, AuthInfo>,
    user_cache: ObservableCache<UserKey, Option<User>>,
}

impl UserLoader {
    pub fn new(store: Store, pipeline: FetchPipeline) -> Self {
        Self {
            store,
            pipeline,
            auth_cache: ObservableCache::new("auth-info"),
            user_cache: ObservableCache::new("user"),
        }
    }

    /// Fetch whatever `action` asks for and dispatch the answer.
    ///
    /// Only requests the store still has pending are answered, so a request
    /// seen twice (once in the startup scan, once as an event) is fetched
    /// once. Actions other than `WantAuthInfo` and `WantUser` are ignored.
    pub async fn handle(&self, action: &Action) {
        match action {
            Action::WantAuthInfo { token } => {
                if self.store.state().pending_auth_info.contains(token) {
                    self.load_auth_info(token).await;
                } else {
                    trace!(key = %AuthInfoKey::new(token.as_str()), "Auth info no longer pending");
                }
            }
            Action::WantUser { uid } => {
                if self.store.state().pending_users.contains(uid) {
                    self.load_user(*uid).await;
                } else {
                    trace!(uid, "User no longer pending");
                }
            }
            _ => {}
        }
    }

    async fn load_auth_info(&self, token: &str) {
        let key = AuthInfoKey::new(token);
        debug!(key = %key, "Loading auth info");

        let pipeline = self.pipeline.clone();
        let owned = token.to_string();
        let stream = self.auth_cache.get(key.clone(), move || async move {
            pipeline.fetch_auth_info(&owned).await
        });

        match stream.value().await {
            Ok(auth_info) => {
                self.store.dispatch(Action::fetched_auth_info(token, auth_info));
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Failed to load auth info");
                self.store.dispatch(Action::FetchFailed {
                    resource: Resource::AuthInfo {
                        token: token.to_string(),
                    },
                    message: error.to_string(),
                });
            }
        }
    }

    async fn load_user(&self, uid: u64) {
        let key = UserKey { uid };
        debug!(key = %key, "Loading user");

        let pipeline = self.pipeline.clone();
        let stream = self
            .user_cache
            .get(key, move || async move { pipeline.fetch_user(uid).await });

        match stream.value().await {
            Ok(user) => {
                if user.is_none() {
                    warn!(uid, "No user record for UID");
                }
                self.store.dispatch(Action::fetched_user(uid, user));
            }
            Err(error) => {
                warn!(uid, error = %error, "Failed to load user");
                self.store.dispatch(Action::FetchFailed {
                    resource: Resource::User { uid },
                    message: error.to_string(),
                });
            }
        }
    }

    /// Answer requests until `events` closes or the task is aborted.
    ///
    /// Requests already pending in the store when this starts are answered
    /// first. Each request runs on its own task so a slow user lookup never
    /// holds up the next token.
    pub async fn run(self, mut events: EventReceiver) {
        for action in self.pending_requests() {
            self.spawn_handle(action);
        }

        loop {
            match events.recv().await {
                Ok(StoreEvent::ActionApplied { record }) => {
                    if matches!(record.action, Action::WantAuthInfo { .. } | Action::WantUser { .. }) {
                        self.spawn_handle(record.action);
                    }
                }
                Ok(StoreEvent::ContextChanged { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("User loader lagged, skipped {} events", skipped);
                    for action in self.pending_requests() {
                        self.spawn_handle(action);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("User loader stopped");
    }

    /// Start [`run`](Self::run) on the current runtime.
    ///
    /// Subscribes before returning, so requests dispatched right after this
    /// call are not missed.
    pub fn spawn(self) -> JoinHandle<()> {
        let events = self.store.events();
        tokio::spawn(self.run(events))
    }

    fn spawn_handle(&self, action: Action) {
        let loader = self.clone();
        tokio::spawn(async move { loader.handle(&action).await });
    }

    fn pending_requests(&self) -> Vec<Action> {
        let state = self.store.state();
        let tokens = state
            .pending_auth_info
            .iter()
            .map(|token| Action::WantAuthInfo { token: token.clone() });
        let users = state.pending_users.iter().map(|&uid| Action::WantUser { uid });
        tokens.chain(users).collect()
    }

    pub fn auth_cache(&self) -> &ObservableCache<AuthInfoKey, AuthInfo> {
        &self.auth_cache
    }

    pub fn user_cache(&self) -> &ObservableCache<UserKey, Option<User>> {
        &self.user_cache
    }
}
