//! Multi-device harness over one shared document server.

#![allow(dead_code)]

use questline_core::{ManualClock, StoreConfig};
use questline_storage::InMemoryKvStore;
use questline_sync_engine::{RetryConfig, SyncConfig, SyncScheduler, SyncStats};
use questline_sync_protocol::Identity;
use questline_sync_server::DocumentServer;
use questline_testkit::{init_test_tracing, FlakyDocumentStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub type Network = FlakyDocumentStore<Arc<DocumentServer>>;
pub type Scheduler = SyncScheduler<InMemoryKvStore, Arc<Network>>;

pub const UID: &str = "u1";

/// One app instance: its scheduler, its own network link and its clock.
pub struct Device {
    pub scheduler: Scheduler,
    pub network: Arc<Network>,
    pub clock: Arc<ManualClock>,
}

pub struct DeviceOptions {
    pub uid: Option<String>,
    pub start_ms: u64,
    pub config: SyncConfig,
    pub store_config: StoreConfig,
    pub local: InMemoryKvStore,
    pub online: bool,
}

impl DeviceOptions {
    pub fn new(start_ms: u64) -> Self {
        Self {
            uid: Some(UID.to_string()),
            start_ms,
            // Retries only when a test asks for them
            config: SyncConfig::default().with_retry(
                RetryConfig::new(5)
                    .with_initial_delay(Duration::from_secs(600))
                    .with_jitter(false),
            ),
            store_config: StoreConfig::default(),
            local: InMemoryKvStore::new(),
            online: true,
        }
    }

    pub fn signed_out(mut self) -> Self {
        self.uid = None;
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn local(mut self, local: InMemoryKvStore) -> Self {
        self.local = local;
        self
    }
}

impl Device {
    pub async fn start(server: &Arc<DocumentServer>, start_ms: u64) -> Self {
        Self::start_with(server, DeviceOptions::new(start_ms)).await
    }

    pub async fn start_with(server: &Arc<DocumentServer>, options: DeviceOptions) -> Self {
        init_test_tracing();
        let network = Arc::new(FlakyDocumentStore::new(Arc::clone(server)));
        network.set_online(options.online);
        let clock = Arc::new(ManualClock::new(options.start_ms));
        let scheduler = SyncScheduler::builder(options.local, Arc::clone(&network))
            .with_config(options.config)
            .with_store_config(options.store_config)
            .with_clock(clock.clone())
            .with_identity(options.uid.map(Identity::new))
            .start()
            .await
            .unwrap();
        Self {
            scheduler,
            network,
            clock,
        }
    }

    /// Sets `collection` to `value`; returns the commit timestamp.
    pub fn edit(&self, collection: &str, value: Value) -> u64 {
        self.scheduler
            .store()
            .mutate(|s| s.with_collection(collection, value))
    }

    pub fn collection(&self, collection: &str) -> Option<Value> {
        self.scheduler.store().read().collection(collection).cloned()
    }

    pub fn updated_at(&self) -> u64 {
        self.scheduler.store().read().updated_at
    }

    pub fn stats(&self) -> SyncStats {
        self.scheduler.stats()
    }

    pub async fn flush(&self) {
        self.scheduler.flush().await.unwrap();
    }
}

/// Flushes every device until cross-device deliveries have settled.
pub async fn settle(devices: &[&Device]) {
    for _ in 0..3 {
        for device in devices {
            device.flush().await;
        }
    }
}

/// Polls `condition` every 10ms for up to 5s.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

/// Path of the shared user's document.
pub fn user_path() -> questline_sync_protocol::DocumentPath {
    Identity::new(UID).document_path()
}
