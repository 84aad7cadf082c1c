//! Service layer for Viewstate
//!
//! # Architecture
//!
//! The service layer follows a facade pattern with [`Session`] as the main
//! entry point. One session owns:
//!
//! - a [`Store`] holding auth and user state
//! - `UserLoader`: answers the store's `WantAuthInfo` / `WantUser` requests
//! - `BlobService`: memoized file reads
//! - `EventBus`: store events for async observers (owned by the store)
//!
//! All of them share one [`FetchPipeline`] built over the injected
//! [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libviewstate::fetch::ScriptedTransport;
//! use libviewstate::service::Session;
//!
//! # async fn example() -> libviewstate::Result<()> {
//! let session = Session::new(Arc::new(ScriptedTransport::new()))?;
//! let _loader = session.spawn_user_loader();
//!
//! let _subscription = session.subscribe(|context| {
//!     println!("signed in: {}", context.signed_in);
//! });
//! session.sign_in("token");
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod events;
pub mod user_loader;

pub use events::{EventBus, EventReceiver, StoreEvent};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use self::blob::BlobService;
use self::user_loader::UserLoader;
use crate::config::Config;
use crate::fetch::{FetchPipeline, Transport};
use crate::store::{Action, DerivedContext, Store, Subscription};
use crate::Result;

/// Main facade tying the store to the fetch layer
pub struct Session {
    config: Arc<Config>,
    store: Store,
    blobs: BlobService,
    user_loader: UserLoader,
}

impl Session {
    /// Create a session with configuration from the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed or validated.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config, transport)
    }

    /// Create a session with a pre-built configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `fetch.request_timeout` is not a valid duration.
    pub fn from_config(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let request_timeout = config.fetch.request_timeout()?;
        let pipeline = FetchPipeline::new(transport, request_timeout);
        let store = Store::new(&config.store);

        let blobs = BlobService::new(pipeline.clone());
        let user_loader = UserLoader::new(store.clone(), pipeline);

        Ok(Self {
            config: Arc::new(config),
            store,
            blobs,
            user_loader,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn blobs(&self) -> &BlobService {
        &self.blobs
    }

    pub fn user_loader(&self) -> &UserLoader {
        &self.user_loader
    }

    /// Run the user loader in the background. Abort the handle to stop it.
    pub fn spawn_user_loader(&self) -> JoinHandle<()> {
        self.user_loader.clone().spawn()
    }

    /// Make `token` the active token.
    pub fn sign_in(&self, token: &str) -> u64 {
        info!("Signing in");
        self.store.dispatch(Action::set_active_token(Some(token)))
    }

    pub fn sign_out(&self) -> u64 {
        info!("Signing out");
        self.store.dispatch(Action::set_active_token(None))
    }

    /// See [`Store::subscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DerivedContext) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Receive store events; see [`Store::events`].
    pub fn events(&self) -> EventReceiver {
        self.store.events()
    }
}
