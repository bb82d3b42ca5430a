//! Observable scheduler status and statistics.

use std::time::Instant;

/// The current state of the sync scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No identity; commits are only saved locally.
    LocalOnly,
    /// Signed in, nothing in flight.
    Idle,
    /// Reading the remote document.
    Pulling,
    /// Writing the remote document.
    Pushing,
    /// The last remote operation succeeded.
    Synced,
    /// The last remote operation failed and nothing is queued for retry.
    Error,
    /// A failed push is waiting for its next attempt.
    RetryWait,
    /// The worker has stopped.
    Stopped,
}

impl SyncStatus {
    /// Returns true if a remote call is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Pulling | SyncStatus::Pushing)
    }

    /// Returns true if commits are being sent to the remote.
    pub fn is_online(&self) -> bool {
        !matches!(self, SyncStatus::LocalOnly | SyncStatus::Stopped)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Successful pushes.
    pub pushes: u64,
    /// Failed pushes, including failed retries.
    pub push_failures: u64,
    /// Successful pulls.
    pub pulls: u64,
    /// Failed pulls.
    pub pull_failures: u64,
    /// Inbound snapshots recognized as this device's own pushes.
    pub echoes_ignored: u64,
    /// Remote states that replaced the local state.
    pub remote_replacements: u64,
    /// Remote states discarded as stale or untimestamped.
    pub remote_discarded: u64,
    /// Retries of the pending push.
    pub retries: u64,
    /// Pending pushes dropped after exhausting their attempts.
    pub retries_exhausted: u64,
    /// Failed local snapshot writes.
    pub persist_failures: u64,
    /// Last time a push or pull succeeded.
    pub last_synced_at: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_predicates() {
        assert!(SyncStatus::Pulling.is_active());
        assert!(SyncStatus::Pushing.is_active());
        assert!(!SyncStatus::RetryWait.is_active());

        assert!(SyncStatus::RetryWait.is_online());
        assert!(!SyncStatus::LocalOnly.is_online());
        assert!(!SyncStatus::Stopped.is_online());
    }

    #[test]
    fn stats_start_empty() {
        let stats = SyncStats::default();
        assert_eq!(stats.pushes, 0);
        assert!(stats.last_synced_at.is_none());
        assert!(stats.last_error.is_none());
    }
}
