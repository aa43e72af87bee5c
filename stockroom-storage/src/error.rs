//! Storage error types.

use stockroom_types::RecordError;
use thiserror::Error;

/// Result type for local store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("local store unavailable: {0}")]
    Unavailable(String),

    #[error("local store lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
