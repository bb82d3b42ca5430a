//! Store and snapshot adapter wired together without a scheduler.

use parking_lot::Mutex;
use questline_core::{ApplicationState, LocalPersistence, ManualClock, StateStore, StoreConfig};
use questline_storage::InMemoryKvStore;
use serde_json::json;
use std::sync::Arc;

fn persisting_store(
    quota: Option<usize>,
) -> (
    Arc<StateStore>,
    Arc<LocalPersistence<InMemoryKvStore>>,
    Arc<Mutex<Vec<String>>>,
    questline_core::Subscription,
) {
    let backend = match quota {
        Some(q) => InMemoryKvStore::with_quota(q),
        None => InMemoryKvStore::new(),
    };
    let persistence = Arc::new(LocalPersistence::new(backend));
    let store = Arc::new(StateStore::with_config(
        persistence.load_or_else(ApplicationState::new),
        StoreConfig::default(),
        Arc::new(ManualClock::new(1_000)),
    ));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let saver = Arc::clone(&persistence);
    let sub = store.subscribe(move |event| {
        if let Err(e) = saver.save(&event.state) {
            sink.lock().push(e.to_string());
        }
    });

    (store, persistence, errors, sub)
}

#[test]
fn every_commit_overwrites_snapshot() {
    let (store, persistence, errors, _sub) = persisting_store(None);

    store.mutate(|s| s.with_collection("tasks", json!(["a"])));
    store.mutate(|s| s.with_collection("tasks", json!(["a", "b"])));

    let snapshot = persistence.load().unwrap();
    assert_eq!(snapshot, *store.read());
    assert!(errors.lock().is_empty());
}

#[test]
fn quota_exceeded_does_not_affect_memory_state() {
    let (store, persistence, errors, _sub) = persisting_store(Some(64));

    store.mutate(|s| s.with_collection("gold", json!(1)));
    let saved = persistence.load().unwrap();

    let ts = store.mutate(|s| s.with_collection("diary", json!("long entry ".repeat(20))));

    assert_eq!(store.read().updated_at, ts);
    assert!(store.read().collection("diary").is_some());
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("quota"));
    // The last good snapshot is still on disk
    assert_eq!(persistence.load(), Some(saved));
}
