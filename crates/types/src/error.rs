//! Unified error type for the memochat workspace.

use thiserror::Error;

/// Message surfaced when the server rejects the current credential.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed";

/// Message surfaced when a request never produced a response.
pub const NETWORK_FAILED_MESSAGE: &str = "network connection failed";

/// Enumerates all error kinds that can occur across memochat crates.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered 401. The credential has already been cleared and
    /// the login redirect fired by the time this is observed.
    #[error("{}", AUTH_FAILED_MESSAGE)]
    AuthExpired,

    /// The body could not be parsed as JSON by any fallback path.
    #[error("{0}")]
    MalformedResponse(String),

    /// The server returned a status >= 500 and the retry budget is spent.
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The server returned a non-success status below 500 (other than 401).
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    /// The request never produced a response (connect, timeout, reset).
    #[error("{0}")]
    NetworkError(String),

    /// The request could not be built (bad URL, bad header value).
    #[error("request error: {0}")]
    Request(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable key-value storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::Request(e.to_string())
        } else {
            Self::NetworkError(e.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl TransportError {
    /// Returns the HTTP status attached to the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired => Some(401),
            Self::ServerError { status, .. } | Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TransportError>;
