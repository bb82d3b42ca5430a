//! Error types for the document server.

use questline_sync_protocol::RemoteError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the document server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The server has been switched offline.
    #[error("server offline")]
    Offline,

    /// Access to the path has been revoked.
    #[error("access denied to {0}")]
    AccessDenied(String),

    /// The document holds an absent-marker field.
    #[error("document {path} holds null field {field}")]
    NullField {
        /// Document path.
        path: String,
        /// Dotted path of the offending field.
        field: String,
    },

    /// The document is larger than the configured limit.
    #[error("document {path} is {size} bytes, limit is {limit}")]
    DocumentTooLarge {
        /// Document path.
        path: String,
        /// Encoded size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::AccessDenied(_)
                | ServerError::NullField { .. }
                | ServerError::DocumentTooLarge { .. }
        )
    }
}

impl From<ServerError> for RemoteError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Offline => RemoteError::Unavailable(err.to_string()),
            ServerError::AccessDenied(path) => RemoteError::PermissionDenied { path },
            ServerError::NullField { .. } => RemoteError::InvalidDocument(err.to_string()),
            ServerError::DocumentTooLarge { .. } => RemoteError::QuotaExceeded(err.to_string()),
            ServerError::Internal(msg) => RemoteError::Other(msg),
        }
    }
}
