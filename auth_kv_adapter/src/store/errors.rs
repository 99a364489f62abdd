use thiserror::Error;

/// Failure reported by the key-value store client.
///
/// Every variant belongs to the "store unavailable" class: the adapter
/// performs no retries and hands these to the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Wrong value type at key: {0}")]
    WrongType(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}
