//! Local snapshot persistence.

use crate::error::{PersistenceError, PersistenceResult};
use crate::state::ApplicationState;
use questline_storage::KeyValueStore;
use tracing::{debug, warn};

/// Storage key holding the serialized application state.
pub const STATE_KEY: &str = "questline.state";

/// Storage key reserved for UI preferences. The core never reads or writes it.
pub const PREFERENCES_KEY: &str = "questline.prefs";

/// Reads and writes the [`ApplicationState`] snapshot under a fixed key.
///
/// The adapter has no network dependency. Failures are returned as values
/// and never panic; a corrupted snapshot reads as absent.
#[derive(Debug)]
pub struct LocalPersistence<K> {
    backend: K,
    key: String,
}

impl<K: KeyValueStore> LocalPersistence<K> {
    /// Creates an adapter using [`STATE_KEY`].
    pub fn new(backend: K) -> Self {
        Self::with_key(backend, STATE_KEY)
    }

    /// Creates an adapter storing the snapshot under `key`.
    pub fn with_key(backend: K, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Serializes `state` and writes it under the snapshot key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the backend rejects the
    /// write (for example, quota exceeded). The previous snapshot is left
    /// in place.
    pub fn save(&self, state: &ApplicationState) -> PersistenceResult<()> {
        let json = serde_json::to_string(state)?;
        self.backend
            .set(&self.key, &json)
            .map_err(|source| PersistenceError::Write {
                key: self.key.clone(),
                source,
            })?;
        debug!(key = %self.key, updated_at = state.updated_at, bytes = json.len(), "snapshot saved");
        Ok(())
    }

    /// Loads the stored snapshot.
    ///
    /// Returns `None` if nothing is stored, the backend cannot be read, or
    /// the stored value does not decode.
    pub fn load(&self) -> Option<ApplicationState> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(key = %self.key, %error, "failed to read snapshot");
                return None;
            }
        };

        match serde_json::from_str::<ApplicationState>(&raw) {
            Ok(state) => Some(state),
            Err(error) => {
                warn!(key = %self.key, %error, "ignoring corrupted snapshot");
                None
            }
        }
    }

    /// Loads the stored snapshot, falling back to `seed` when there is none.
    pub fn load_or_else<F>(&self, seed: F) -> ApplicationState
    where
        F: FnOnce() -> ApplicationState,
    {
        self.load().unwrap_or_else(seed)
    }

    /// Removes the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot remove the key.
    pub fn clear(&self) -> PersistenceResult<()> {
        self.backend
            .remove(&self.key)
            .map_err(|source| PersistenceError::Clear {
                key: self.key.clone(),
                source,
            })
    }
}
