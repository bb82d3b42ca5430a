//! Error types for the sync engine.

use questline_sync_protocol::{ProtocolError, RemoteError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Writing the remote document failed.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] RemoteError),

    /// Reading or subscribing to the remote document failed.
    #[error("remote read failed: {0}")]
    RemoteRead(#[source] RemoteError),

    /// The remote document could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A remote call did not finish within the request timeout.
    #[error("operation timed out")]
    Timeout,

    /// The operation needs a signed-in identity.
    #[error("not signed in")]
    NotSignedIn,

    /// The scheduler has shut down.
    #[error("sync scheduler has shut down")]
    Shutdown,

    /// A remote call panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RemoteWrite(e) | SyncError::RemoteRead(e) => e.is_retryable(),
            SyncError::Timeout => true,
            _ => false,
        }
    }
}
