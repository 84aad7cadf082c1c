//! Fetch pipeline
//!
//! Builds one GraphQL request, sends it through the injected [`Transport`]
//! under the per-request timeout, and unwraps the response:
//!
//! - structured errors → [`FetchError::Graphql`] with the first message
//! - no data → [`FetchError::EmptyResponse`]
//! - data of the wrong shape → [`FetchError::Decode`]
//!
//! Query-specific checks (a missing commit, for instance) live with the
//! queries in [`queries`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use libviewstate::fetch::{FetchPipeline, ScriptedTransport};
//! use libviewstate::types::BlobRequest;
//!
//! # async fn example() -> Result<(), libviewstate::error::FetchError> {
//! let transport = Arc::new(ScriptedTransport::new());
//! let pipeline = FetchPipeline::new(transport, Duration::from_secs(30));
//!
//! let file = pipeline
//!     .fetch_blob(&BlobRequest::new("github.com/a/b", "deadbeef", "README.md"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod queries;
pub mod transport;

pub use mock::ScriptedTransport;
pub use transport::{transport_fn, FnTransport, Transport};

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Outbound GraphQL request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub query: String,
    pub variables: Value,
    /// Client-side limit; `None` waits indefinitely
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Access token for the `Authorization` header
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl GraphQLRequest {
    pub fn new(query: &str, variables: Value) -> Self {
        Self {
            operation_name: operation_name(query),
            query: query.to_string(),
            variables,
            timeout: None,
            access_token: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }
}

/// Raw GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLErrorEntry>>,
}

impl GraphQLResponse {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    pub fn errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: Some(
                messages
                    .into_iter()
                    .map(|message| GraphQLErrorEntry {
                        message: message.into(),
                        path: None,
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLErrorEntry {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
}

/// Executes queries through a transport.
#[derive(Clone)]
pub struct FetchPipeline {
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
}

impl FetchPipeline {
    pub fn new(transport: Arc<dyn Transport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Request for `query` carrying the default timeout.
    pub fn request(&self, query: &str, variables: Value) -> GraphQLRequest {
        GraphQLRequest::new(query, variables).with_timeout(Some(self.request_timeout))
    }

    /// Run `query` with `variables` and decode `data` into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, FetchError> {
        self.execute_request(self.request(query, variables)).await
    }

    /// Run a prepared request and decode `data` into `T`.
    pub async fn execute_request<T: DeserializeOwned>(&self, request: GraphQLRequest) -> Result<T, FetchError> {
        let operation = request
            .operation_name
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        debug!(
            operation = %operation,
            transport = self.transport.name(),
            timeout_ms = request.timeout.map(|t| t.as_millis() as u64),
            "Sending query"
        );

        let response = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                .await
                .map_err(|_| FetchError::Timeout(limit.as_millis() as u64))?,
            None => self.transport.send(request).await,
        };

        let result = response.and_then(unwrap_response);
        if let Err(error) = &result {
            warn!(operation = %operation, error = %error, "Query failed");
        }
        result
    }
}

/// Turn a raw response into data or the first reported error.
pub fn unwrap_response<T: DeserializeOwned>(response: GraphQLResponse) -> Result<T, FetchError> {
    if let Some(first) = response.errors.as_ref().and_then(|errors| errors.first()) {
        return Err(FetchError::Graphql(first.message.clone()));
    }
    let data = response
        .data
        .filter(|data| !data.is_null())
        .ok_or(FetchError::EmptyResponse)?;
    serde_json::from_value(data).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Name following `query`/`mutation`/`subscription`, if the document has one.
pub fn operation_name(query: &str) -> Option<String> {
    let mut words = query.split_whitespace();
    match words.next()? {
        "query" | "mutation" | "subscription" => {}
        _ => return None,
    }
    let name: String = words
        .next()?
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
