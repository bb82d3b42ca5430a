//! Per-path snapshot listener table.

use parking_lot::RwLock;
use questline_sync_protocol::{ListenerRegistration, SnapshotCallback};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener = Arc<SnapshotCallback>;

#[derive(Default)]
pub(crate) struct ListenerTable {
    next_id: AtomicU64,
    by_path: RwLock<HashMap<String, Vec<(u64, Listener)>>>,
}

impl ListenerTable {
    pub(crate) fn register(
        self: &Arc<Self>,
        path: &str,
        callback: SnapshotCallback,
    ) -> ListenerRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.by_path
            .write()
            .entry(path.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        let table: Weak<Self> = Arc::downgrade(self);
        let path = path.to_string();
        ListenerRegistration::new(move || {
            if let Some(table) = table.upgrade() {
                table.unregister(&path, id);
            }
        })
    }

    fn unregister(&self, path: &str, id: u64) {
        let mut by_path = self.by_path.write();
        if let Some(listeners) = by_path.get_mut(path) {
            listeners.retain(|(lid, _)| *lid != id);
            if listeners.is_empty() {
                by_path.remove(path);
            }
        }
    }

    /// Invokes every listener of `path` with `document`.
    ///
    /// The table lock is released before any callback runs, so a callback
    /// may register or remove listeners.
    pub(crate) fn notify(&self, path: &str, document: &Value) -> usize {
        let listeners: Vec<Listener> = match self.by_path.read().get(path) {
            Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        for listener in &listeners {
            listener(Some(document.clone()));
        }
        listeners.len()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.by_path.read().get(path).map_or(0, Vec::len)
    }
}
