//! Transport abstraction
//!
//! The pipeline never talks to the network itself. Whatever executes a
//! GraphQL request (an HTTP client, an in-process schema, a scripted test
//! double) implements [`Transport`] and is injected.

use std::future::Future;

use async_trait::async_trait;

use super::{GraphQLRequest, GraphQLResponse};
use crate::error::FetchError;

/// Sends one request and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `request`.
    ///
    /// # Errors
    ///
    /// Only delivery problems belong here (`FetchError::Transport`). A
    /// response carrying GraphQL errors is still `Ok`; the pipeline unwraps
    /// it.
    async fn send(&self, request: GraphQLRequest) -> Result<GraphQLResponse, FetchError>;

    /// Short identifier for logs
    fn name(&self) -> &str {
        "transport"
    }
}

/// Adapts an async closure into a [`Transport`].
pub struct FnTransport<F> {
    send: F,
}

/// Build a transport from `send`.
///
/// ```
/// use libviewstate::fetch::{transport_fn, GraphQLResponse};
///
/// let transport = transport_fn(|_request| async {
///     Ok(GraphQLResponse::data(serde_json::json!({"currentUser": null})))
/// });
/// # let _ = transport;
/// ```
pub fn transport_fn<F, Fut>(send: F) -> FnTransport<F>
where
    F: Fn(GraphQLRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GraphQLResponse, FetchError>> + Send + 'static,
{
    FnTransport { send }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(GraphQLRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GraphQLResponse, FetchError>> + Send + 'static,
{
    async fn send(&self, request: GraphQLRequest) -> Result<GraphQLResponse, FetchError> {
        (self.send)(request).await
    }

    fn name(&self) -> &str {
        "fn"
    }
}
