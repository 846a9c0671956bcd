//! Store error types

use crate::persistence::PersistenceError;

/// Errors surfaced by timer store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Invalid input; nothing was changed
    #[error("validation failed: {0}")]
    Validation(String),

    /// No timer with this id
    #[error("timer not found: {0}")]
    NotFound(String),

    /// The write (or read) did not reach durable storage; in-memory state is unchanged
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Change subscription failed; observers keep polling
    #[error("change notification channel failed: {0}")]
    NotificationChannel(String),
}

/// Result type for timer store operations
pub type StoreResult<T> = Result<T, StoreError>;
