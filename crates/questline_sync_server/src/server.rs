//! In-process document server.

use crate::config::{Delivery, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::listeners::ListenerTable;
use parking_lot::{Mutex, RwLock};
use questline_sync_protocol::{
    DocumentPath, DocumentStore, ListenerRegistration, RemoteResult, SnapshotCallback,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    body: Value,
}

/// Counters describing server activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Successful reads.
    pub reads: u64,
    /// Successful writes.
    pub writes: u64,
    /// Rejected writes.
    pub rejected_writes: u64,
    /// Snapshot callbacks invoked.
    pub notifications: u64,
}

/// In-process document store.
///
/// Holds one JSON document per path. Every successful [`set`] bumps the
/// path's version and notifies its listeners.
///
/// Listeners are invoked without any server lock held; a listener may call
/// back into the server.
///
/// [`set`]: DocumentStore::set
pub struct DocumentServer {
    config: ServerConfig,
    documents: RwLock<HashMap<String, StoredDocument>>,
    listeners: Arc<ListenerTable>,
    pending: Mutex<VecDeque<(String, Value)>>,
    denied: RwLock<HashSet<String>>,
    online: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    rejected: AtomicU64,
    notifications: AtomicU64,
}

impl DocumentServer {
    /// Creates a server with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a server with the given configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            documents: RwLock::new(HashMap::new()),
            listeners: Arc::new(ListenerTable::default()),
            pending: Mutex::new(VecDeque::new()),
            denied: RwLock::new(HashSet::new()),
            online: AtomicBool::new(true),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Switches connectivity. While offline every operation fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::debug!(online, "server connectivity changed");
    }

    /// Returns true if the server is online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Revokes access to `path`.
    pub fn deny(&self, path: &DocumentPath) {
        self.denied.write().insert(path.as_str().to_string());
    }

    /// Restores access to `path`.
    pub fn allow(&self, path: &DocumentPath) {
        self.denied.write().remove(path.as_str());
    }

    /// Returns the version of the document at `path`, or 0 if absent.
    pub fn version(&self, path: &DocumentPath) -> u64 {
        self.documents
            .read()
            .get(path.as_str())
            .map_or(0, |doc| doc.version)
    }

    /// Returns the document at `path` without access checks or counters.
    pub fn peek(&self, path: &DocumentPath) -> Option<Value> {
        self.documents
            .read()
            .get(path.as_str())
            .map(|doc| doc.body.clone())
    }

    /// Returns the number of listeners registered for `path`.
    pub fn listener_count(&self, path: &DocumentPath) -> usize {
        self.listeners.count(path.as_str())
    }

    /// Returns the number of undelivered notifications.
    pub fn pending_notifications(&self) -> usize {
        self.pending.lock().len()
    }

    /// Delivers queued notifications in write order.
    ///
    /// Only meaningful with [`Delivery::Deferred`]. Returns the number of
    /// writes delivered.
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            // Pop one at a time so listeners may write (and queue) while we deliver
            let next = self.pending.lock().pop_front();
            let Some((path, body)) = next else { break };
            self.fan_out(&path, &body);
            delivered += 1;
        }
        delivered
    }

    /// Drops queued notifications without delivering them.
    pub fn discard_pending(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    /// Returns activity counters.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            rejected_writes: self.rejected.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
        }
    }

    fn check_access(&self, path: &DocumentPath) -> ServerResult<()> {
        if !self.is_online() {
            return Err(ServerError::Offline);
        }
        if self.denied.read().contains(path.as_str()) {
            return Err(ServerError::AccessDenied(path.to_string()));
        }
        Ok(())
    }

    fn validate(&self, path: &DocumentPath, document: &Value) -> ServerResult<()> {
        if self.config.reject_null_fields {
            if let Some(field) = find_null_field(document, "") {
                return Err(ServerError::NullField {
                    path: path.to_string(),
                    field,
                });
            }
        }
        if let Some(limit) = self.config.max_document_bytes {
            let size = serde_json::to_vec(document)
                .map_err(|e| ServerError::Internal(e.to_string()))?
                .len();
            if size > limit {
                return Err(ServerError::DocumentTooLarge {
                    path: path.to_string(),
                    size,
                    limit,
                });
            }
        }
        Ok(())
    }

    fn write(&self, path: &DocumentPath, document: Value) -> ServerResult<()> {
        self.check_access(path)?;
        if let Err(e) = self.validate(path, &document) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %path, error = %e, "write rejected");
            return Err(e);
        }

        let version = {
            let mut documents = self.documents.write();
            let entry = documents
                .entry(path.as_str().to_string())
                .or_insert(StoredDocument {
                    version: 0,
                    body: Value::Null,
                });
            entry.version += 1;
            entry.body = document.clone();
            entry.version
        };
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(path = %path, version, "document written");

        match self.config.delivery {
            Delivery::Immediate => self.fan_out(path.as_str(), &document),
            Delivery::Deferred => self
                .pending
                .lock()
                .push_back((path.as_str().to_string(), document)),
        }
        Ok(())
    }

    fn fan_out(&self, path: &str, body: &Value) {
        let count = self.listeners.notify(path, body);
        self.notifications
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

impl Default for DocumentServer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for DocumentServer {
    fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Value>> {
        self.check_access(path)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.peek(path))
    }

    fn set(&self, path: &DocumentPath, document: Value) -> RemoteResult<()> {
        Ok(self.write(path, document)?)
    }

    fn on_snapshot(
        &self,
        path: &DocumentPath,
        callback: SnapshotCallback,
    ) -> RemoteResult<ListenerRegistration> {
        self.check_access(path)?;
        Ok(self.listeners.register(path.as_str(), callback))
    }
}

impl std::fmt::Debug for DocumentServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentServer")
            .field("config", &self.config)
            .field("documents", &self.documents.read().len())
            .field("online", &self.is_online())
            .finish()
    }
}

/// Returns the dotted path of the first `null` object field, if any.
fn find_null_field(value: &Value, prefix: &str) -> Option<String> {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            if v.is_null() {
                Some(join(k))
            } else {
                find_null_field(v, &join(k))
            }
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_null_field(v, &join(&i.to_string()))),
        _ => None,
    }
}
