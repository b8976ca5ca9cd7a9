//! Error types for the API client.
//!
//! # Design
//! Every non-2xx response lands in `Http` with the status code and the
//! response text (or the reason phrase when the body is empty). There is no
//! dedicated not-found or unauthorized variant: callers inspect `status()`.
//! Transport failures are flattened to strings so the error stays `Clone`,
//! which lets the query cache hand one failure to every waiter of a shared
//! in-flight fetch.

use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by request building, execution, and response parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server returned a status outside 200..=299.
    #[error("{status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The route could not be resolved against the base URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The method name is not one the client knows how to send.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// The first query key element is missing or is not a string.
    #[error("invalid query key: {0}")]
    InvalidQueryKey(String),
}

impl ApiError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status carried by the error, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(s) if (400..500).contains(&s))
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(s) if s >= 500)
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}
