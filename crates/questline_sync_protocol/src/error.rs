//! Error types for remote sync.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type for document encoding and decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors reported by a remote document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The store cannot be reached (offline, connection reset).
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The identity is not allowed to access the document.
    #[error("permission denied for {path}")]
    PermissionDenied {
        /// Document path.
        path: String,
    },

    /// The store refused the write for size or rate reasons.
    #[error("remote quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The store rejected the document's contents.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Any other failure.
    #[error("remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Returns true if the operation may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_) | RemoteError::QuotaExceeded(_) | RemoteError::Other(_)
        )
    }
}

/// Errors converting between application states and remote documents.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The document is not a JSON object.
    #[error("remote document must be an object, found {0}")]
    NotAnObject(&'static str),

    /// A field has the wrong type.
    #[error("invalid field {field}: {source}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be encoded.
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}
