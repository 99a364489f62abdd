//! Error types for the adapter

use thiserror::Error;

use crate::codec::DecodeError;
use crate::store::StoreError;

/// Errors returned by adapter operations.
///
/// Absence of a record is not an error: read paths answer `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The store client failed; passed through unchanged, never retried
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// An identifier cannot be encoded into a key without ambiguity
    #[error("Invalid key segment: {0}")]
    InvalidKey(String),

    /// An update targeted a user that does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A record exists but cannot be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Store(err) => tracing::error!("Store unavailable: {}", err),
            Self::InvalidKey(msg) => tracing::warn!("Invalid key segment: {}", msg),
            Self::UserNotFound(id) => tracing::warn!("User not found: {}", id),
            Self::Decode(err) => tracing::warn!("Decode error: {}", err),
            Self::Config(msg) => tracing::error!("Configuration error: {}", msg),
        }
        self
    }
}
