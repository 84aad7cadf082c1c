//! Error types for Viewstate
//!
//! The store and the context deriver never fail. Everything fallible lives
//! behind the fetch pipeline and the observable cache, and surfaces as a
//! [`FetchError`] on the shared stream of whoever subscribed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewstateError>;

#[derive(Error, Debug)]
pub enum ViewstateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewstateError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ViewstateError::InvalidInput(_) => 3,
            ViewstateError::Fetch(FetchError::InvalidRequest(_)) => 3,
            ViewstateError::Fetch(FetchError::NotFound(_)) => 4,
            ViewstateError::Fetch(_) => 1,
            ViewstateError::Config(_) => 1,
            ViewstateError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid duration for {field}: {message}")]
    InvalidDuration { field: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failure of a single fetch.
///
/// `Clone` is required: one terminal result is replayed to every subscriber
/// of a shared stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The transport could not deliver the request or its response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The per-request timeout elapsed before the transport answered.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The server answered with structured errors; carries the first message.
    #[error("{0}")]
    Graphql(String),

    /// The response had neither data nor errors.
    #[error("Empty response: no data returned")]
    EmptyResponse,

    /// The response was well formed but lacked the requested object.
    #[error("{0}")]
    NotFound(String),

    /// The response data did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Parameters were rejected before anything was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Whether asking again could produce a different answer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_)
                | FetchError::Timeout(_)
                | FetchError::EmptyResponse
        )
    }

    /// Domain-level "this does not exist", as opposed to "try again".
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}
