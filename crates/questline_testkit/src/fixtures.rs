//! Test fixtures.
//!
//! Provides sample application states, temporary snapshot directories and
//! a shared in-process document server.

use questline_core::ApplicationState;
use questline_storage::FileKvStore;
use questline_sync_protocol::{DocumentPath, Identity, RemoteDocument};
use questline_sync_server::DocumentServer;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed key-value store in a temporary directory.
pub struct TempSnapshotDir {
    /// The directory, removed on drop.
    dir: TempDir,
}

impl TempSnapshotDir {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a store over the directory.
    ///
    /// Only one store may be open at a time; drop it before reopening.
    pub fn open(&self) -> FileKvStore {
        FileKvStore::open(self.dir.path()).expect("Failed to open file store")
    }
}

impl Default for TempSnapshotDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a server shared between test devices, and the path of `uid`'s document.
pub fn shared_server(uid: &str) -> (Arc<DocumentServer>, DocumentPath) {
    (
        Arc::new(DocumentServer::new()),
        Identity::new(uid).document_path(),
    )
}

/// A small state resembling real app data, stamped `updated_at`.
pub fn sample_state(updated_at: u64) -> ApplicationState {
    ApplicationState::at(updated_at)
        .with_collection(
            "tasks",
            json!([
                {"id": "t1", "title": "Water plants", "done": false, "xp": 10},
                {"id": "t2", "title": "Stretch", "done": true, "xp": 5}
            ]),
        )
        .with_collection("habits", json!([{"id": "h1", "name": "Read", "streak": 3}]))
        .with_collection("profile", json!({"level": 2, "gold": 40}))
}

/// A state whose collections hold absent markers at several depths.
pub fn state_with_nulls(updated_at: u64) -> ApplicationState {
    ApplicationState::at(updated_at)
        .with_collection(
            "tasks",
            json!([
                {"id": "t1", "due": null, "tags": {"color": null, "name": "home"}},
                null
            ]),
        )
        .with_collection("profile", json!({"avatar": null, "gold": 40}))
        .with_collection("draft", Value::Null)
}

/// Reads and decodes the document at `path` without touching server counters.
pub fn remote_document(server: &DocumentServer, path: &DocumentPath) -> Option<RemoteDocument> {
    server
        .peek(path)
        .map(|value| RemoteDocument::decode(value).expect("Stored document must decode"))
}

/// Returns the `updatedAt` of the document at `path`.
pub fn remote_updated_at(server: &DocumentServer, path: &DocumentPath) -> Option<u64> {
    remote_document(server, path).map(|doc| doc.updated_at())
}
