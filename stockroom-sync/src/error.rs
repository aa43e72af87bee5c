//! Sync and dispatch error types.

use thiserror::Error;

/// Result type for dispatcher and sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the dispatcher, the queue manager and the engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend could not be reached (connect failure, timeout, broken body).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered and refused the request.
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Offline and the local queue is unavailable, so the write was not kept.
    #[error("offline and unable to queue {0}")]
    QueueUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sync engine not running")]
    NotRunning,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// True when the failure means "no network", as opposed to a refusal.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
