use thiserror::Error;

use waypoint_shared::{CryptoError, Transient};

/// Failures reported by the external backend (database + RPC layer).
///
/// The variants map the backend's error taxonomy onto the retry policy:
/// `Network` and `Timeout` are transient, everything else surfaces
/// immediately.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Other(String),
}

impl Transient for BackendError {
    fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_) | BackendError::Timeout)
    }
}

/// Errors surfaced to callers of the client API.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Client not initialized")]
    NotInitialized,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unknown message")]
    UnknownMessage,

    #[error("Connection manager unavailable")]
    ManagerUnavailable,

    #[error("State lock poisoned")]
    StatePoisoned,
}
