//! The canonical state store.
//!
//! [`StateStore`] owns the single in-memory [`ApplicationState`]. Every
//! write goes through one of three entry points:
//!
//! - [`StateStore::mutate`] for local edits from feature code
//! - [`StateStore::replace_from_remote`] for inbound remote snapshots (LWW)
//! - [`StateStore::force_replace`] for manual resync
//!
//! Each commit is delivered synchronously, in commit order, to every
//! subscriber as a [`CommitEvent`]. The store does no I/O itself; the sync
//! scheduler subscribes and performs persistence and pushes.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::conflict::{self, ConflictResolution};
use crate::echo::EchoGuard;
use crate::state::ApplicationState;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Where a commit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOrigin {
    /// A local edit via [`StateStore::mutate`].
    Local,
    /// A remote snapshot accepted by the conflict resolver.
    Remote,
    /// A forced replacement from a manual resync.
    Resync,
}

impl CommitOrigin {
    /// Returns true for commits whose content came from the remote store.
    pub fn is_remote_sourced(&self) -> bool {
        matches!(self, CommitOrigin::Remote | CommitOrigin::Resync)
    }
}

/// A committed state change, delivered to subscribers.
#[derive(Debug, Clone)]
pub struct CommitEvent {
    /// The newly canonical state.
    pub state: Arc<ApplicationState>,
    /// Where the commit came from.
    pub origin: CommitOrigin,
    /// Per-store commit counter, starting at 1.
    pub sequence: u64,
}

impl CommitEvent {
    /// Timestamp of the committed state.
    pub fn updated_at(&self) -> u64 {
        self.state.updated_at
    }
}

/// Outcome of offering a remote state to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The remote state replaced the local one.
    Replaced {
        /// Timestamp of the accepted state.
        updated_at: u64,
    },
    /// The local state was kept and the remote one discarded.
    KeptLocal {
        /// Timestamp of the local state.
        local: u64,
        /// Timestamp of the discarded remote state.
        remote: u64,
    },
}

impl MergeOutcome {
    /// Returns true if the remote state was accepted.
    pub fn replaced(&self) -> bool {
        matches!(self, MergeOutcome::Replaced { .. })
    }
}

type Listener = Arc<dyn Fn(&CommitEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, listener));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.listeners.read().iter().any(|(existing, _)| *existing == id)
    }

    fn len(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self, event: &CommitEvent) {
        // Snapshot the list so listeners may (un)subscribe while being notified
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Handle returned by [`StateStore::subscribe`].
///
/// The listener stays registered until the handle is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    /// Removes the listener.
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    /// Returns true while the listener is registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The canonical in-memory application state.
///
/// # Thread Safety
///
/// Reads never wait on commits for longer than a pointer swap. Commits are
/// serialized, so subscribers observe them strictly in order.
///
/// Listeners run while the commit lock is held: a listener must not call
/// [`mutate`](Self::mutate) (or the other commit entry points) on the same
/// store, or it will deadlock. Hand work off to a queue instead.
///
/// # Example
///
/// ```rust
/// use questline_core::{ApplicationState, StateStore};
/// use serde_json::json;
///
/// let store = StateStore::new(ApplicationState::new());
/// store.mutate(|state| state.with_collection("tasks", json!(["water plants"])));
/// assert_eq!(store.read().collection("tasks"), Some(&json!(["water plants"])));
/// ```
pub struct StateStore {
    state: RwLock<Arc<ApplicationState>>,
    /// Serializes commits; holds the last commit sequence.
    commit_lock: Mutex<u64>,
    listeners: Arc<ListenerRegistry>,
    clock: Arc<dyn Clock>,
    echo_guard: EchoGuard,
}

impl StateStore {
    /// Creates a store seeded with `initial`, using the system clock.
    pub fn new(initial: ApplicationState) -> Self {
        Self::with_config(initial, StoreConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a store with an explicit configuration and clock.
    pub fn with_config(
        initial: ApplicationState,
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(Arc::new(initial)),
            commit_lock: Mutex::new(0),
            listeners: Arc::new(ListenerRegistry::default()),
            clock,
            echo_guard: EchoGuard::new(config.echo_policy),
        }
    }

    /// Returns the current canonical state.
    pub fn read(&self) -> Arc<ApplicationState> {
        Arc::clone(&self.state.read())
    }

    /// Applies `updater` to a copy of the current state and commits it.
    ///
    /// The committed state is stamped with `max(now, previous + 1)`, so
    /// `updated_at` strictly increases even if the clock stalls or steps
    /// back. Any `updated_at` set by the updater is overwritten.
    ///
    /// Returns the committed timestamp.
    pub fn mutate<F>(&self, updater: F) -> u64
    where
        F: FnOnce(ApplicationState) -> ApplicationState,
    {
        let mut sequence = self.commit_lock.lock();
        let current = self.read();
        let mut next = updater((*current).clone());
        next.updated_at = self
            .clock
            .now_millis()
            .max(current.updated_at.saturating_add(1));
        let updated_at = next.updated_at;
        self.commit(&mut sequence, next, CommitOrigin::Local);
        updated_at
    }

    /// Registers `listener` for every future commit.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CommitEvent) + Send + Sync + 'static,
    {
        let id = self.listeners.add(Arc::new(listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    /// Offers a remote state to the store.
    ///
    /// The conflict resolver runs against the canonical state under the
    /// commit lock. If the remote state wins, the echo guard is armed for
    /// its timestamp and it is committed with [`CommitOrigin::Remote`].
    pub fn replace_from_remote(&self, candidate: ApplicationState) -> MergeOutcome {
        let mut sequence = self.commit_lock.lock();
        let current = self.read();

        match conflict::decide(&current, &candidate) {
            ConflictResolution::KeepLocal => {
                debug!(
                    local = current.updated_at,
                    remote = candidate.updated_at,
                    "remote state discarded"
                );
                MergeOutcome::KeptLocal {
                    local: current.updated_at,
                    remote: candidate.updated_at,
                }
            }
            ConflictResolution::AcceptRemote => {
                let updated_at = candidate.updated_at;
                debug!(
                    local = current.updated_at,
                    remote = updated_at,
                    "remote state accepted"
                );
                self.echo_guard.arm(updated_at);
                self.commit(&mut sequence, candidate, CommitOrigin::Remote);
                MergeOutcome::Replaced { updated_at }
            }
        }
    }

    /// Replaces the canonical state unconditionally.
    ///
    /// Used by manual resync. The echo guard is armed as for a remote
    /// replacement.
    pub fn force_replace(&self, state: ApplicationState) {
        let mut sequence = self.commit_lock.lock();
        self.echo_guard.arm(state.updated_at);
        self.commit(&mut sequence, state, CommitOrigin::Resync);
    }

    /// Returns the echo guard owned by this store.
    pub fn echo_guard(&self) -> &EchoGuard {
        &self.echo_guard
    }

    /// Returns the number of commits so far.
    pub fn commit_count(&self) -> u64 {
        *self.commit_lock.lock()
    }

    /// Returns the number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn commit(&self, sequence: &mut u64, next: ApplicationState, origin: CommitOrigin) {
        let next = Arc::new(next);
        *self.state.write() = Arc::clone(&next);
        *sequence += 1;

        let event = CommitEvent {
            state: next,
            origin,
            sequence: *sequence,
        };
        self.listeners.notify(&event);
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("updated_at", &self.read().updated_at)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}
