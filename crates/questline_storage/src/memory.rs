//! In-memory key/value store.

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key/value store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Sessions that don't need a durable snapshot
///
/// An optional quota bounds the total number of bytes (keys plus values)
/// the store will hold, which is how quota-limited host storage is
/// simulated.
///
/// # Example
///
/// ```rust
/// use questline_storage::{InMemoryKvStore, KeyValueStore};
///
/// let store = InMemoryKvStore::with_quota(8);
/// assert!(store.set("k", "1234567").is_ok());
/// assert!(store.set("k", "12345678").unwrap_err().is_quota_exceeded());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl InMemoryKvStore {
    /// Creates a new empty store with no quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store that rejects writes beyond `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Creates a store pre-populated with a single entry.
    ///
    /// Useful for testing startup from an existing snapshot.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self {
            entries: RwLock::new(entries),
            quota: None,
        }
    }

    /// Returns the number of bytes currently held (keys plus values).
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let required = others + key.len() + value.len();
            if required > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    quota,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryKvStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn memory_set_and_get() {
        let store = InMemoryKvStore::new();
        store.set("a", "one").unwrap();
        store.set("b", "two").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("one"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn memory_set_overwrites() {
        let store = InMemoryKvStore::new();
        store.set("a", "one").unwrap();
        store.set("a", "uno").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("uno"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_remove() {
        let store = InMemoryKvStore::new();
        store.set("a", "one").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        // removing again is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn memory_quota_counts_replaced_value_once() {
        let store = InMemoryKvStore::with_quota(10);
        store.set("k", "123456789").unwrap();
        assert_eq!(store.used_bytes(), 10);

        // Replacing the same key frees the old value first
        store.set("k", "987654321").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("987654321"));
    }

    #[test]
    fn memory_quota_rejection_keeps_previous_value() {
        let store = InMemoryKvStore::with_quota(10);
        store.set("k", "small").unwrap();

        let err = store.set("k", "much too large for quota").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 10, .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn memory_with_entry() {
        let store = InMemoryKvStore::with_entry("seed", "value");
        assert_eq!(store.get("seed").unwrap().as_deref(), Some("value"));
    }
}
