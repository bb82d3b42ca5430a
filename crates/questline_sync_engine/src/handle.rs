//! The facade handed to feature code.

use crate::error::SyncResult;
use crate::scheduler::{request_resync, Job, ResyncOutcome};
use questline_core::{ApplicationState, CommitEvent, StateStore, Subscription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Cloneable access to the canonical state.
///
/// Exposes exactly what feature code needs: [`read`](Self::read),
/// [`mutate`](Self::mutate), [`subscribe`](Self::subscribe) and
/// [`manual_resync`](Self::manual_resync). Persistence and remote sync
/// happen behind it.
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<StateStore>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl StateHandle {
    pub(crate) fn new(store: Arc<StateStore>, jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self { store, jobs }
    }

    /// Returns the current state.
    pub fn read(&self) -> Arc<ApplicationState> {
        self.store.read()
    }

    /// Applies `updater` and commits the result. Returns the new timestamp.
    ///
    /// Never waits on I/O.
    pub fn mutate<F>(&self, updater: F) -> u64
    where
        F: FnOnce(ApplicationState) -> ApplicationState,
    {
        self.store.mutate(updater)
    }

    /// Registers `listener` for every commit.
    ///
    /// The listener runs under the store's commit lock and must not call
    /// [`mutate`](Self::mutate).
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CommitEvent) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Replaces local state with the remote document.
    ///
    /// See [`SyncScheduler::manual_resync`](crate::SyncScheduler::manual_resync).
    ///
    /// # Errors
    ///
    /// Fails without an identity, when the pull fails, or after shutdown.
    pub async fn manual_resync(&self) -> SyncResult<ResyncOutcome> {
        request_resync(&self.jobs).await
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("store", &self.store)
            .finish()
    }
}
