use chartbase_crypto::PassthroughCipher;
use chartbase_model::{RecordSchema, SchemaRegistry};
use chartbase_storage::RecordStore;
use chartbase_sync::{ConflictResolver, ResolutionStrategy, SyncError, SyncOutbox};
use chartbase_types::{QueueOperation, SyncStatus};
use serde_json::json;
use std::sync::Arc;

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(RecordSchema::builder("Patient").build().unwrap())
        .unwrap();
    registry
        .register(RecordSchema::builder("Encounter").build().unwrap())
        .unwrap();
    registry
}

async fn store() -> RecordStore {
    RecordStore::open_in_memory(registry(), Arc::new(PassthroughCipher))
        .await
        .unwrap()
}

/// Local record plus a divergent remote copy of it.
async fn conflicting_pair(
    store: &RecordStore,
) -> (chartbase_model::Record, chartbase_model::Record) {
    let local = store
        .create("Patient", "p1", json!({"status": "draft", "note": "local"}))
        .await
        .unwrap();
    let mut remote = local.clone();
    remote.payload = json!({"status": "final", "note": "remote"});
    remote.version = 5;
    (local, remote)
}

#[tokio::test]
async fn local_strategy_keeps_local_payload() {
    let store = store().await;
    let (local, remote) = conflicting_pair(&store).await;

    let resolver = ConflictResolver::new(store.clone());
    let resolved = resolver
        .resolve(&local, &remote, ResolutionStrategy::Local)
        .await
        .unwrap();
    assert_eq!(resolved.payload.pointer("/note"), Some(&json!("local")));
    // Resolution is a normal write: version moves past both inputs' claims.
    assert_eq!(resolved.version, 2);

    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, resolved.payload);
}

#[tokio::test]
async fn remote_strategy_takes_remote_payload() {
    let store = store().await;
    let (local, remote) = conflicting_pair(&store).await;

    let resolved = ConflictResolver::new(store.clone())
        .resolve(&local, &remote, ResolutionStrategy::Remote)
        .await
        .unwrap();
    assert_eq!(resolved.payload.pointer("/note"), Some(&json!("remote")));
    assert_eq!(resolved.payload.pointer("/_merge"), None);
}

#[tokio::test]
async fn merge_strategy_tags_remote_payload() {
    let store = store().await;
    let (local, remote) = conflicting_pair(&store).await;

    let resolved = ConflictResolver::new(store.clone())
        .resolve(&local, &remote, ResolutionStrategy::Merge)
        .await
        .unwrap();
    assert_eq!(resolved.payload.pointer("/status"), Some(&json!("final")));
    assert_eq!(
        resolved.payload.pointer("/_merge/resolved_by"),
        Some(&json!("auto-merge"))
    );

    // The stamped payload is what got persisted.
    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert!(read.payload.pointer("/_merge/resolved_at").is_some());
}

#[tokio::test]
async fn resolution_enqueues_an_update_entry() {
    let store = store().await;
    let (local, remote) = conflicting_pair(&store).await;
    let before = store.pending_sync_entries().await.unwrap().len();

    ConflictResolver::new(store.clone())
        .resolve(&local, &remote, ResolutionStrategy::Remote)
        .await
        .unwrap();

    let entries = store.pending_sync_entries().await.unwrap();
    assert_eq!(entries.len(), before + 1);
    assert_eq!(entries.last().unwrap().operation, QueueOperation::Update);
}

#[tokio::test]
async fn mismatched_sides_are_rejected() {
    let store = store().await;
    let local = store.create("Patient", "p1", json!({})).await.unwrap();
    let other = store.create("Encounter", "e1", json!({})).await.unwrap();

    let err = ConflictResolver::new(store.clone())
        .resolve(&local, &other, ResolutionStrategy::Remote)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MismatchedRecords { .. }));

    let mut same_type = local.clone();
    same_type.id = "p2".to_string();
    let err = ConflictResolver::new(store)
        .resolve(&local, &same_type, ResolutionStrategy::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MismatchedRecords { .. }));
}

#[tokio::test]
async fn outbox_drains_to_synced() {
    let store = store().await;
    store.create("Patient", "p1", json!({"v": 1})).await.unwrap();
    store.update("Patient", "p1", json!({"v": 2})).await.unwrap();

    let outbox = SyncOutbox::new(store.clone());
    let entries = outbox.pending_entries().await.unwrap();
    assert_eq!(entries.len(), 2);

    // Simulated driver loop: one failure, then deliveries.
    outbox.mark_syncing(entries[0].id).await.unwrap();
    outbox.mark_failed(entries[0].id, "offline").await.unwrap();
    let record = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Error);

    outbox.mark_completed(entries[0].id).await.unwrap();
    outbox.mark_completed(entries[1].id).await.unwrap();
    assert!(outbox.pending_entries().await.unwrap().is_empty());
    // The earlier failure is forgotten once everything is delivered.
    let record = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
}
