//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Writing the value would exceed the store's quota.
    #[error("quota exceeded writing {key:?}: {required} bytes required, quota is {quota}")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Total bytes the store would hold after the write.
        required: usize,
        /// Configured quota in bytes.
        quota: usize,
    },

    /// Another process holds the storage directory lock.
    #[error("storage directory is locked by another process")]
    Locked,

    /// The key cannot be mapped onto the backend.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    /// Returns true if the failure is a quota rejection.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
