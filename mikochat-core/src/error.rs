//! Error types for mikochat-core

use thiserror::Error;

/// Main error type for the mikochat-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Durable storage is full (quota exceeded)
    #[error("storage quota exceeded: {0}")]
    StorageQuota(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required capability is not configured
    #[error("{0} is not configured or available")]
    ServiceUnavailable(String),

    /// A configured capability failed the request
    #[error("{service} request failed: {message}")]
    Service { service: String, message: String },

    /// Input rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// A turn is already in flight for the active session
    #[error("a response is already in progress")]
    TurnInFlight,

    /// A shared side-effect resource is occupied
    #[error("{0}")]
    Busy(String),

    /// Session index does not exist
    #[error("session not found: {0}")]
    SessionNotFound(usize),

    /// Message id does not exist in the active history
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Activation code did not match any tier
    #[error("invalid activation code")]
    InvalidActivationCode,
}

impl Error {
    /// Shorthand for a failed capability call.
    pub fn service(service: &str, message: impl Into<String>) -> Self {
        Error::Service {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for mikochat-core
pub type Result<T> = std::result::Result<T, Error>;
