//! Error types for the state core.

use questline_storage::StorageError;
use thiserror::Error;

/// Result type for local persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors raised while writing the local snapshot.
///
/// These never reach feature code: the sync scheduler logs and counts them,
/// and the in-memory state stays valid.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The state could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend rejected the write.
    #[error("failed to write snapshot {key:?}: {source}")]
    Write {
        /// Storage key being written.
        key: String,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// The backend could not remove the snapshot.
    #[error("failed to clear snapshot {key:?}: {source}")]
    Clear {
        /// Storage key being removed.
        key: String,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },
}

impl PersistenceError {
    /// Returns true if the backend rejected the write for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, PersistenceError::Write { source, .. } if source.is_quota_exceeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_detection() {
        let err = PersistenceError::Write {
            key: "questline.state".into(),
            source: StorageError::QuotaExceeded {
                key: "questline.state".into(),
                required: 10,
                quota: 5,
            },
        };
        assert!(err.is_quota_exceeded());
        assert!(err.to_string().contains("questline.state"));

        let err = PersistenceError::Write {
            key: "questline.state".into(),
            source: StorageError::Locked,
        };
        assert!(!err.is_quota_exceeded());
    }
}
