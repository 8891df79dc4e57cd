//! Error types for the resource store clients.

use thiserror::Error;

use crate::selector::SelectorError;

/// Errors that can occur when talking to the resource store.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to reach the API server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Credentials were rejected or lack permission.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the API server.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// Label selector did not parse.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// HTTP error not classified above.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl ClientError {
    /// Returns true if the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Serialization(e.to_string())
        } else {
            Self::Http(e)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
