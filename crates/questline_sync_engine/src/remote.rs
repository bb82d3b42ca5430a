//! Remote sync adapter.

use crate::error::{SyncError, SyncResult};
use questline_core::{ApplicationState, DeviceId, PushOrigin};
use questline_sync_protocol::{DocumentStore, Identity, ListenerRegistration, RemoteDocument};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Reads, writes and watches one user's remote document.
///
/// Every push is a whole-document overwrite of the sanitized state,
/// stamped with a [`PushOrigin`] from [`next_origin`](Self::next_origin).
pub struct RemoteSyncAdapter<D> {
    store: D,
    device: DeviceId,
    sequence: AtomicU64,
}

impl<D: DocumentStore> RemoteSyncAdapter<D> {
    /// Creates an adapter writing as `device`.
    pub fn new(store: D, device: DeviceId) -> Self {
        Self {
            store,
            device,
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the device this adapter writes as.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Returns the underlying document store.
    pub fn store(&self) -> &D {
        &self.store
    }

    /// Allocates the origin for the next push.
    pub fn next_origin(&self) -> PushOrigin {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        PushOrigin::new(self.device, sequence)
    }

    /// Overwrites the remote document with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteWrite`] if the store rejects the write.
    pub fn push(
        &self,
        identity: &Identity,
        state: &ApplicationState,
        origin: PushOrigin,
    ) -> SyncResult<()> {
        let path = identity.document_path();
        let document = RemoteDocument::encode(state, origin)?;
        self.store
            .set(&path, document)
            .map_err(SyncError::RemoteWrite)?;
        debug!(
            path = %path,
            updated_at = state.updated_at,
            sequence = origin.sequence,
            "pushed state"
        );
        Ok(())
    }

    /// Reads the remote document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteRead`] if the store cannot be read, or
    /// [`SyncError::Protocol`] if the document cannot be decoded.
    pub fn pull(&self, identity: &Identity) -> SyncResult<Option<RemoteDocument>> {
        let path = identity.document_path();
        let Some(value) = self.store.get(&path).map_err(SyncError::RemoteRead)? else {
            debug!(path = %path, "no remote document");
            return Ok(None);
        };
        let document = RemoteDocument::decode(value)?;
        debug!(
            path = %path,
            updated_at = document.updated_at(),
            timestamped = document.timestamped,
            "pulled state"
        );
        Ok(Some(document))
    }

    /// Watches the remote document.
    ///
    /// `on_update` runs for every change, including this device's own
    /// pushes. Deletions and undecodable snapshots are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteRead`] if the listener cannot be registered.
    pub fn subscribe<F>(&self, identity: &Identity, on_update: F) -> SyncResult<ListenerRegistration>
    where
        F: Fn(RemoteDocument) + Send + Sync + 'static,
    {
        let path = identity.document_path();
        let uid = identity.uid.clone();
        let callback = move |snapshot: Option<Value>| {
            let Some(value) = snapshot else {
                debug!(uid = %uid, "remote document removed");
                return;
            };
            match RemoteDocument::decode(value) {
                Ok(document) => on_update(document),
                Err(e) => warn!(uid = %uid, error = %e, "skipping undecodable remote snapshot"),
            }
        };
        self.store
            .on_snapshot(&path, Box::new(callback))
            .map_err(SyncError::RemoteRead)
    }
}

impl<D> std::fmt::Debug for RemoteSyncAdapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSyncAdapter")
            .field("device", &self.device)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
