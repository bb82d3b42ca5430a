//! The remote document store contract.

use crate::error::RemoteResult;
use crate::identity::DocumentPath;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the current contents of a watched document.
///
/// `None` means the document does not exist.
pub type SnapshotCallback = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// A per-path JSON document store with change notification.
///
/// Writes are whole-document overwrites. Implementations notify every
/// listener of a path after each successful write to it, including the
/// listeners registered by the writer itself.
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or denies access.
    fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Value>>;

    /// Overwrites the document at `path` with `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached, denies access, or
    /// rejects the document.
    fn set(&self, path: &DocumentPath, document: Value) -> RemoteResult<()>;

    /// Registers `callback` for changes to `path`.
    ///
    /// The callback is not invoked for the document's current contents;
    /// use [`get`](Self::get) for those.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be registered.
    fn on_snapshot(
        &self,
        path: &DocumentPath,
        callback: SnapshotCallback,
    ) -> RemoteResult<ListenerRegistration>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Value>> {
        (**self).get(path)
    }

    fn set(&self, path: &DocumentPath, document: Value) -> RemoteResult<()> {
        (**self).set(path, document)
    }

    fn on_snapshot(
        &self,
        path: &DocumentPath,
        callback: SnapshotCallback,
    ) -> RemoteResult<ListenerRegistration> {
        (**self).on_snapshot(path, callback)
    }
}

/// Handle to a registered snapshot listener.
///
/// The listener is removed by [`remove`](Self::remove) or when the handle
/// is dropped.
#[must_use = "dropping the registration removes the listener"]
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerRegistration {
    /// Creates a registration that runs `remove` once when released.
    pub fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Creates a registration with nothing to release.
    pub fn noop() -> Self {
        Self { remove: None }
    }

    /// Removes the listener.
    pub fn remove(mut self) {
        self.release();
    }

    /// Returns true if the listener has not been removed yet.
    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}
