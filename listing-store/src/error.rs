//! Error types for the listing store

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Listing store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Listing id does not exist or has been deleted
    #[error("Listing not found: {0}")]
    NotFound(uuid::Uuid),

    /// Caller's expected version no longer matches the stored version
    ///
    /// Recoverable: re-fetch the listing and retry with the current
    /// version.
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict {
        /// Version the caller believed was current
        expected: u64,
        /// Version actually stored
        found: u64,
    },

    /// Privileged mutation attempted without an actor identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Payload failed structural constraints
    #[error("Validation error: {0}")]
    Validation(String),

    /// Audit chain failed integrity verification
    #[error("Audit integrity violation: {0}")]
    AuditIntegrity(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error (stored audit entries)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Serialization error (stored listings)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may retry the operation
    ///
    /// `VersionConflict` after a re-fetch, infrastructure faults with
    /// backoff. `NotFound` and `Unauthorized` are terminal for the
    /// request.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::VersionConflict { .. }
                | Error::Storage(_)
                | Error::Serialization(_)
                | Error::Json(_)
                | Error::Concurrency(_)
                | Error::Io(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        let conflict = Error::VersionConflict {
            expected: 0,
            found: 1,
        };
        assert!(conflict.is_retriable());
        assert!(Error::Storage("disk".into()).is_retriable());

        assert!(!Error::NotFound(uuid::Uuid::nil()).is_retriable());
        assert!(!Error::Unauthorized("no actor".into()).is_retriable());
        assert!(!Error::Validation("name missing".into()).is_retriable());
    }
}
