//! Key/value store trait definition.

use crate::error::StorageResult;

/// A durable key/value store holding serialized snapshots.
///
/// The contract mirrors a browser-style local storage: string keys map to
/// string values, and every call is synchronous from the caller's point of
/// view.
///
/// # Invariants
///
/// - `get` returns exactly the value most recently passed to `set` for the key
/// - `set` either stores the whole value or leaves the previous value intact
/// - Implementations must be `Send + Sync`; they are shared behind `Arc`
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or would exceed a quota.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}
