//! Persistence error types

/// Errors that can occur while reading or writing timer rows
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Local storage could not be read or written
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed while handling the request
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The backend refused the request itself; sending it again won't help
    #[error("storage backend rejected the request: {0}")]
    Rejected(String),

    /// The backend could not be reached at all
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Serialization(_) | Self::Rejected(_))
    }
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_refused_and_malformed_calls_are_permanent() {
        assert!(PersistenceError::Backend("HTTP 503".to_string()).is_transient());
        assert!(PersistenceError::Unavailable("connection refused".to_string()).is_transient());
        assert!(!PersistenceError::Rejected("HTTP 422".to_string()).is_transient());

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!PersistenceError::from(bad_json).is_transient());
    }
}
