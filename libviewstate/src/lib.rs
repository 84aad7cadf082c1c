//! Viewstate - shared view state for a code-browsing front end
//!
//! This library keeps the signed-in identity in a unidirectional store whose
//! derived context views subscribe to, and memoizes network reads so every
//! consumer of the same key shares one fetch.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cache::{Emission, ObservableCache, SharedStream};
pub use config::Config;
pub use error::{FetchError, Result, ViewstateError};
pub use fetch::{FetchPipeline, Transport};
pub use service::Session;
pub use store::{Action, DerivedContext, Store, StoreState, Subscription};
pub use types::{AuthInfo, BlobFile, BlobRequest, User};
