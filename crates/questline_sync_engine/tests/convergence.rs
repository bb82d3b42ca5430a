//! Last-writer-wins convergence under delayed and reordered delivery.

mod common;

use common::{settle, user_path, Device, DeviceOptions, UID};
use questline_core::{GuardState, ManualClock};
use questline_storage::InMemoryKvStore;
use questline_sync_engine::{SyncScheduler, SyncStatus};
use questline_sync_protocol::{
    DocumentPath, DocumentStore, Identity, ListenerRegistration, RemoteResult, SnapshotCallback,
};
use questline_sync_server::{Delivery, DocumentServer, ServerConfig};
use questline_testkit::{init_test_tracing, remote_updated_at};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A store where another device writes right after the first read returns.
struct WriteAfterFirstRead {
    inner: Arc<DocumentServer>,
    write: Value,
    written: AtomicBool,
}

impl DocumentStore for WriteAfterFirstRead {
    fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Value>> {
        let document = self.inner.get(path)?;
        if !self.written.swap(true, Ordering::SeqCst) {
            self.inner.set(path, self.write.clone())?;
        }
        Ok(document)
    }

    fn set(&self, path: &DocumentPath, document: Value) -> RemoteResult<()> {
        self.inner.set(path, document)
    }

    fn on_snapshot(
        &self,
        path: &DocumentPath,
        callback: SnapshotCallback,
    ) -> RemoteResult<ListenerRegistration> {
        self.inner.on_snapshot(path, callback)
    }
}

#[tokio::test]
async fn offline_edit_wins_after_reconnect() {
    let server = Arc::new(DocumentServer::new());
    let a = Device::start(&server, 200).await;
    let b = Device::start(&server, 210).await;

    b.network.set_online(false);
    a.edit("tasks", json!(["from a"]));
    b.edit("tasks", json!(["from b"]));
    settle(&[&a, &b]).await;

    assert_eq!(remote_updated_at(&server, &user_path()), Some(200));
    assert_eq!(b.scheduler.pending_push(), Some(210));
    assert_eq!(b.scheduler.status(), SyncStatus::RetryWait);
    assert_eq!(b.collection("tasks"), Some(json!(["from b"])));

    b.network.set_online(true);
    b.scheduler.notify_connectivity_restored();
    settle(&[&a, &b]).await;

    assert_eq!(remote_updated_at(&server, &user_path()), Some(210));
    assert_eq!(b.scheduler.pending_push(), None);
    assert_eq!(b.scheduler.status(), SyncStatus::Synced);
    assert_eq!(a.updated_at(), 210);
    assert_eq!(a.collection("tasks"), Some(json!(["from b"])));

    a.scheduler.shutdown().await;
    b.scheduler.shutdown().await;
}

#[tokio::test]
async fn stale_echo_is_discarded_without_arming_guard() {
    let server = Arc::new(DocumentServer::with_config(
        ServerConfig::default().with_delivery(Delivery::Deferred),
    ));
    let a = Device::start(&server, 100).await;

    a.edit("gold", json!(1));
    a.flush().await;
    a.clock.set(150);
    a.edit("gold", json!(2));
    a.flush().await;
    assert_eq!(server.pending_notifications(), 2);

    server.deliver_pending();
    a.flush().await;

    let stats = a.stats();
    assert_eq!(stats.remote_discarded, 1);
    assert_eq!(stats.echoes_ignored, 1);
    assert_eq!(stats.remote_replacements, 0);
    assert_eq!(a.updated_at(), 150);
    assert_eq!(a.collection("gold"), Some(json!(2)));
    assert_eq!(a.scheduler.store().echo_guard().state(), GuardState::Open);

    a.scheduler.shutdown().await;
}

#[tokio::test]
async fn tie_with_foreign_write_keeps_local() {
    let server = Arc::new(DocumentServer::new());
    let a = Device::start(&server, 500).await;
    a.edit("gold", json!(1));
    a.flush().await;

    server
        .set(&user_path(), json!({"updatedAt": 500, "gold": 99}))
        .unwrap();
    a.flush().await;

    assert_eq!(a.collection("gold"), Some(json!(1)));
    assert_eq!(a.stats().remote_discarded, 1);
    assert_eq!(a.stats().remote_replacements, 0);

    a.scheduler.shutdown().await;
}

#[tokio::test]
async fn late_joiner_adopts_newer_remote_but_keeps_newer_local() {
    let server = Arc::new(DocumentServer::new());
    let a = Device::start(&server, 1_000).await;
    a.edit("gold", json!(5));
    a.flush().await;

    let behind = Device::start(&server, 10).await;
    assert_eq!(behind.updated_at(), 1_000);
    assert_eq!(behind.collection("gold"), Some(json!(5)));

    let local = questline_storage::InMemoryKvStore::with_entry(
        questline_core::STATE_KEY,
        json!({"updatedAt": 9_000, "gold": 7}).to_string(),
    );
    let ahead = Device::start_with(&server, DeviceOptions::new(9_500).local(local)).await;
    assert_eq!(ahead.updated_at(), 9_000);
    assert_eq!(ahead.collection("gold"), Some(json!(7)));
    assert_eq!(ahead.stats().remote_discarded, 1);
    // Startup never pushes on its own
    assert_eq!(remote_updated_at(&server, &user_path()), Some(1_000));

    ahead.edit("gold", json!(8));
    settle(&[&a, &behind, &ahead]).await;
    assert_eq!(a.collection("gold"), Some(json!(8)));
    assert_eq!(behind.collection("gold"), Some(json!(8)));

    a.scheduler.shutdown().await;
    behind.scheduler.shutdown().await;
    ahead.scheduler.shutdown().await;
}

#[tokio::test]
async fn reconnect_adopts_newer_remote_before_retrying_push() {
    let server = Arc::new(DocumentServer::new());
    let a = Device::start(&server, 1_000).await;
    let b = Device::start(&server, 2_000).await;

    // A keeps its subscription but misses every snapshot while offline
    a.network.set_online(false);
    a.edit("gold", json!(1));
    a.flush().await;
    assert_eq!(a.scheduler.pending_push(), Some(1_000));

    b.edit("gold", json!(2));
    settle(&[&a, &b]).await;
    assert_eq!(a.updated_at(), 1_000);

    a.network.set_online(true);
    a.scheduler.notify_connectivity_restored();
    settle(&[&a, &b]).await;

    assert_eq!(remote_updated_at(&server, &user_path()), Some(2_000));
    assert_eq!(a.updated_at(), 2_000);
    assert_eq!(a.collection("gold"), Some(json!(2)));
    assert_eq!(a.scheduler.pending_push(), None);
    assert_eq!(a.stats().retries, 0);
    assert_eq!(b.collection("gold"), Some(json!(2)));

    a.scheduler.shutdown().await;
    b.scheduler.shutdown().await;
}

#[tokio::test]
async fn write_between_startup_read_and_subscribe_is_not_missed() {
    init_test_tracing();
    let server = Arc::new(DocumentServer::new());
    server
        .set(&user_path(), json!({"updatedAt": 500, "gold": 1}))
        .unwrap();
    let remote = WriteAfterFirstRead {
        inner: Arc::clone(&server),
        write: json!({"updatedAt": 9_000, "gold": 9}),
        written: AtomicBool::new(false),
    };

    let scheduler = SyncScheduler::builder(InMemoryKvStore::new(), remote)
        .with_clock(Arc::new(ManualClock::new(100)))
        .with_identity(Some(Identity::new(UID)))
        .start()
        .await
        .unwrap();
    scheduler.flush().await.unwrap();

    let state = scheduler.store().read();
    assert_eq!(state.updated_at, 9_000);
    assert_eq!(state.collection("gold"), Some(&json!(9)));
    assert_eq!(remote_updated_at(&server, &user_path()), Some(9_000));

    scheduler.shutdown().await;
}
