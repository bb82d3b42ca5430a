//! Fault injection for remote stores.
//!
//! [`FlakyDocumentStore`] wraps any [`DocumentStore`] and lets a test take
//! it offline, make the next writes fail, or make calls hang until
//! released.

use parking_lot::{Condvar, Mutex};
use questline_sync_protocol::{
    DocumentPath, DocumentStore, ListenerRegistration, RemoteError, RemoteResult,
    SnapshotCallback,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A [`DocumentStore`] wrapper with switchable failures.
///
/// Faults apply to this wrapper only; other clients of the inner store
/// are unaffected. That makes it a per-device network: while offline the
/// device can neither write nor read, and snapshots of other devices'
/// writes are lost rather than delivered late.
pub struct FlakyDocumentStore<D> {
    inner: D,
    online: Arc<AtomicBool>,
    failing_sets: Mutex<VecDeque<RemoteError>>,
    hanging: Mutex<bool>,
    released: Condvar,
    blocked: AtomicU64,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
}

impl<D: DocumentStore> FlakyDocumentStore<D> {
    /// Wraps `inner` with no faults active.
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            online: Arc::new(AtomicBool::new(true)),
            failing_sets: Mutex::new(VecDeque::new()),
            hanging: Mutex::new(false),
            released: Condvar::new(),
            blocked: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
            set_calls: AtomicU64::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Switches this device's connectivity.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns true if the device is online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Makes the next `errors.len()` writes fail with the given errors, in order.
    pub fn fail_next_sets(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.failing_sets.lock().extend(errors);
    }

    /// Makes every call block until [`release`](Self::release).
    pub fn hang(&self) {
        *self.hanging.lock() = true;
    }

    /// Unblocks hung calls and stops hanging.
    pub fn release(&self) {
        *self.hanging.lock() = false;
        self.released.notify_all();
    }

    /// Returns the number of calls currently blocked by [`hang`](Self::hang).
    pub fn blocked_calls(&self) -> u64 {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Returns the number of `get` calls seen, including failed ones.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of `set` calls seen, including failed ones.
    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn wait_if_hanging(&self) {
        let mut hanging = self.hanging.lock();
        if !*hanging {
            return;
        }
        self.blocked.fetch_add(1, Ordering::SeqCst);
        while *hanging {
            self.released.wait(&mut hanging);
        }
        self.blocked.fetch_sub(1, Ordering::SeqCst);
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("device offline".into()))
        }
    }
}

impl<D: DocumentStore> DocumentStore for FlakyDocumentStore<D> {
    fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Value>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_hanging();
        self.check_online()?;
        self.inner.get(path)
    }

    fn set(&self, path: &DocumentPath, document: Value) -> RemoteResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_hanging();
        self.check_online()?;
        if let Some(error) = self.failing_sets.lock().pop_front() {
            return Err(error);
        }
        self.inner.set(path, document)
    }

    fn on_snapshot(
        &self,
        path: &DocumentPath,
        callback: SnapshotCallback,
    ) -> RemoteResult<ListenerRegistration> {
        self.check_online()?;
        let online = Arc::clone(&self.online);
        self.inner.on_snapshot(
            path,
            Box::new(move |snapshot| {
                if online.load(Ordering::SeqCst) {
                    callback(snapshot);
                }
            }),
        )
    }
}
