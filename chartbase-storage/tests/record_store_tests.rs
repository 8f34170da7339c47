use chartbase_crypto::{DerivedKey, MasterKeyCipher, PassthroughCipher, RecordCipher};
use chartbase_model::{RecordSchema, SchemaRegistry};
use chartbase_storage::{RecordStore, StorageError, StoreConfig};
use chartbase_types::SyncStatus;
use serde_json::json;
use std::sync::Arc;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            RecordSchema::builder("Patient")
                .index("/gender")
                .index("/birth_date")
                .encrypt("/name")
                .encrypt("/ssn")
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(RecordSchema::builder("Encounter").index("/patient_id").build().unwrap())
        .unwrap();
    registry
}

async fn plain_store() -> RecordStore {
    init_logging();
    RecordStore::open_in_memory(registry(), Arc::new(PassthroughCipher))
        .await
        .unwrap()
}

fn fixed_cipher() -> Arc<dyn RecordCipher> {
    Arc::new(MasterKeyCipher::new(
        DerivedKey::from_bytes([11u8; 32]),
        DerivedKey::from_bytes([22u8; 32]),
    ))
}

async fn encrypted_store() -> RecordStore {
    init_logging();
    RecordStore::open_in_memory(registry(), fixed_cipher())
        .await
        .unwrap()
}

#[tokio::test]
async fn create_then_read_round_trips() {
    let store = plain_store().await;
    let payload = json!({"name": "Ada Okafor", "gender": "female"});

    let created = store.create("Patient", "p1", payload.clone()).await.unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.payload, payload);
    assert_eq!(created.sync_status, SyncStatus::Pending);

    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, payload);
    assert_eq!(read.version, 1);
}

#[tokio::test]
async fn encrypted_round_trip_and_opacity_at_rest() {
    let store = encrypted_store().await;
    let payload = json!({"name": "Ada Okafor", "ssn": "123-45-6789", "gender": "female"});
    store.create("Patient", "p1", payload.clone()).await.unwrap();

    // Plaintext comes back through read.
    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, payload);

    // The persisted representation never contains the plaintext values.
    let stored = store.live_records_protected("Patient").await.unwrap();
    assert_eq!(stored.len(), 1);
    let at_rest = &stored[0];
    assert_ne!(at_rest.payload.pointer("/name"), Some(&json!("Ada Okafor")));
    assert_ne!(at_rest.payload.pointer("/ssn"), Some(&json!("123-45-6789")));
    assert_eq!(at_rest.payload.pointer("/gender"), Some(&json!("female")));

    let info = at_rest.encryption.as_ref().unwrap();
    assert_eq!(info.fields.len(), 2);
    assert!(at_rest.search_hashes.contains_key("/name"));
    assert!(at_rest.search_hashes.contains_key("/ssn"));
}

#[tokio::test]
async fn duplicate_create_fails_and_leaves_state_intact() {
    let store = plain_store().await;
    store
        .create("Patient", "p1", json!({"gender": "female"}))
        .await
        .unwrap();

    let err = store
        .create("Patient", "p1", json!({"gender": "male"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }));

    // Original record untouched; exactly one queue entry.
    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, json!({"gender": "female"}));
    assert_eq!(read.version, 1);
    assert_eq!(store.pending_sync_entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_conflicts_with_soft_deleted_record() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({})).await.unwrap();
    store.delete("Patient", "p1").await.unwrap();

    let err = store.create("Patient", "p1", json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }));
}

#[tokio::test]
async fn read_absent_returns_none() {
    let store = plain_store().await;
    assert!(store.read("Patient", "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_increments_version_by_exactly_one() {
    let store = plain_store().await;
    store
        .create("Patient", "p2", json!({"gender": "female"}))
        .await
        .unwrap();

    let mut expected = 1;
    for gender in ["male", "female", "male"] {
        let updated = store
            .update("Patient", "p2", json!({"gender": gender}))
            .await
            .unwrap();
        expected += 1;
        assert_eq!(updated.version, expected);
    }

    let read = store.read("Patient", "p2").await.unwrap().unwrap();
    assert_eq!(read.version, 4);
    assert_eq!(read.payload, json!({"gender": "male"}));
}

#[tokio::test]
async fn update_absent_or_deleted_fails_with_not_found() {
    let store = plain_store().await;
    let err = store.update("Patient", "ghost", json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    store.create("Patient", "p1", json!({})).await.unwrap();
    store.delete("Patient", "p1").await.unwrap();
    let err = store.update("Patient", "p1", json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn update_checked_detects_version_conflict() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({"v": 0})).await.unwrap();
    store.update("Patient", "p1", json!({"v": 1})).await.unwrap();

    // Stale expectation: someone else already moved version to 2.
    let err = store
        .update_checked("Patient", "p1", json!({"v": 99}), 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::VersionConflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));

    // The losing write left nothing behind.
    let read = store.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, json!({"v": 1}));
    assert_eq!(read.version, 2);

    // The right expectation goes through.
    let updated = store
        .update_checked("Patient", "p1", json!({"v": 2}), 2)
        .await
        .unwrap();
    assert_eq!(updated.version, 3);
}

#[tokio::test]
async fn delete_is_idempotent_and_hides_record() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({})).await.unwrap();

    store.delete("Patient", "p1").await.unwrap();
    assert!(store.read("Patient", "p1").await.unwrap().is_none());
    let entries_after_first = store.pending_sync_entries().await.unwrap().len();

    // Second delete: no error, no new queue entry, same observable state.
    store.delete("Patient", "p1").await.unwrap();
    assert!(store.read("Patient", "p1").await.unwrap().is_none());
    assert_eq!(
        store.pending_sync_entries().await.unwrap().len(),
        entries_after_first
    );

    // Deleting something that never existed is also fine.
    store.delete("Patient", "never").await.unwrap();
}

#[tokio::test]
async fn unknown_record_type_is_rejected() {
    let store = plain_store().await;
    let err = store.create("Widget", "w1", json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::UnsupportedType(_)));
    let err = store.read("Widget", "w1").await.unwrap_err();
    assert!(matches!(err, StorageError::UnsupportedType(_)));
}

#[tokio::test]
async fn closed_store_rejects_all_calls() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({})).await.unwrap();
    store.close().await;

    let err = store.read("Patient", "p1").await.unwrap_err();
    assert!(matches!(err, StorageError::NotInitialized));
    let err = store.create("Patient", "p2", json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::NotInitialized));
}

#[tokio::test]
async fn stats_counts_live_deleted_and_pending() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({})).await.unwrap();
    store.create("Patient", "p2", json!({})).await.unwrap();
    store.create("Encounter", "e1", json!({})).await.unwrap();
    store.delete("Patient", "p1").await.unwrap();

    let stats = store.stats().await.unwrap();
    let patients = stats.records.get("Patient").unwrap();
    assert_eq!(patients.live, 1);
    assert_eq!(patients.soft_deleted, 1);
    assert_eq!(stats.records.get("Encounter").unwrap().live, 1);
    // 3 creates + 1 delete, none completed.
    assert_eq!(stats.pending_queue_entries, 4);
}

#[tokio::test]
async fn clear_all_wipes_everything() {
    let store = plain_store().await;
    store.create("Patient", "p1", json!({})).await.unwrap();
    store.clear_all().await.unwrap();

    let stats = store.stats().await.unwrap();
    assert!(stats.records.is_empty());
    assert_eq!(stats.pending_queue_entries, 0);
    assert!(store.read("Patient", "p1").await.unwrap().is_none());
    // A fresh lifecycle can start after the purge.
    store.create("Patient", "p1", json!({})).await.unwrap();
}

#[tokio::test]
async fn data_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        path: Some(dir.path().join("chartbase.db")),
        sweep_interval: None,
    };
    let payload = json!({"name": "Ada Okafor", "gender": "female"});

    {
        let store = RecordStore::open(config.clone(), registry(), fixed_cipher())
            .await
            .unwrap();
        store.create("Patient", "p1", payload.clone()).await.unwrap();
        store.close().await;
    }

    let reopened = RecordStore::open(config, registry(), fixed_cipher())
        .await
        .unwrap();
    let read = reopened.read("Patient", "p1").await.unwrap().unwrap();
    assert_eq!(read.payload, payload);
    assert_eq!(read.version, 1);
}

#[tokio::test]
async fn initialize_flag_selects_cipher() {
    let store = RecordStore::initialize(StoreConfig::default(), registry(), false)
        .await
        .unwrap();
    store
        .create("Patient", "p1", json!({"name": "Ada"}))
        .await
        .unwrap();
    // Passthrough: stored form equals plaintext.
    let stored = store.live_records_protected("Patient").await.unwrap();
    assert_eq!(stored[0].payload.pointer("/name"), Some(&json!("Ada")));
    assert!(stored[0].encryption.is_none());

    let store = RecordStore::initialize(StoreConfig::default(), registry(), true)
        .await
        .unwrap();
    store
        .create("Patient", "p1", json!({"name": "Ada"}))
        .await
        .unwrap();
    let stored = store.live_records_protected("Patient").await.unwrap();
    assert_ne!(stored[0].payload.pointer("/name"), Some(&json!("Ada")));
    assert!(stored[0].encryption.is_some());
}

#[tokio::test]
async fn candidates_by_index_narrows_live_records() {
    let store = plain_store().await;
    store
        .create("Patient", "p1", json!({"gender": "male"}))
        .await
        .unwrap();
    store
        .create("Patient", "p2", json!({"gender": "female"}))
        .await
        .unwrap();
    store
        .create("Patient", "p3", json!({"gender": "female"}))
        .await
        .unwrap();
    store.delete("Patient", "p3").await.unwrap();

    let candidates = store
        .candidates_by_index("Patient", "/gender", vec!["female".into()])
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, "p2");
}
