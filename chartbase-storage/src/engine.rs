//! The record storage engine.
//!
//! One SQLite database holds three tables:
//!
//! - `records` — current state per (type, id), payload in protected form
//! - `sync_queue` — the outbox, one entry per successful mutation
//! - `record_index` — scalar renderings of indexed fields (search hashes for
//!   encrypted fields) used by the query engine for candidate narrowing
//!
//! Every mutation writes the record, its index rows and its queue entry in
//! one transaction: they either all commit or none do. The public API is
//! async; the actual SQLite work runs on the blocking pool.

use crate::error::{StorageError, StorageResult};
use crate::rows::{
    index_value, queue_entry_from_row, record_from_row, QueueRow, RecordRow, RECORD_COLUMNS,
};
use crate::{queue, sweep};
use chartbase_crypto::{MasterKeyCipher, PassthroughCipher, ProtectedPayload, RecordCipher};
use chartbase_model::{Record, RecordSchema, SchemaRegistry};
use chartbase_types::{now_ms, QueueOperation, SyncStatus};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

const MS_PER_DAY: i64 = 86_400_000;

/// Store open options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file path; `None` opens an in-memory store.
    pub path: Option<PathBuf>,
    /// Interval for the background expiration sweep; `None` disables the
    /// timer (the startup sweep still runs, and `expire()` stays callable).
    pub sweep_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            sweep_interval: Some(Duration::from_secs(3600)),
        }
    }
}

/// Per-type record counts reported by [`RecordStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub live: i64,
    pub soft_deleted: i64,
}

/// Read-only store statistics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Counts per record type (only types with at least one row appear).
    pub records: BTreeMap<String, TypeCounts>,
    /// Outbox entries not yet completed.
    pub pending_queue_entries: i64,
}

pub(crate) struct StoreInner {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) registry: SchemaRegistry,
    pub(crate) cipher: Arc<dyn RecordCipher>,
}

/// The record store: CRUD, soft delete, versioning, expiration and the
/// outbox, over an encrypted-at-field-level SQLite database.
///
/// Cheap to clone; all clones share one underlying connection.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
    open: Arc<AtomicBool>,
    sweeper: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl RecordStore {
    /// Opens the store, runs the startup expiration sweep, and starts the
    /// periodic sweep timer if configured.
    pub async fn open(
        config: StoreConfig,
        registry: SchemaRegistry,
        cipher: Arc<dyn RecordCipher>,
    ) -> StorageResult<Self> {
        let path = config.path.clone();
        let inner = tokio::task::spawn_blocking(move || -> StorageResult<StoreInner> {
            let conn = match path {
                Some(p) => Connection::open(p)?,
                None => Connection::open_in_memory()?,
            };
            init_schema(&conn)?;
            Ok(StoreInner {
                conn: Mutex::new(conn),
                registry,
                cipher,
            })
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;

        let inner = Arc::new(inner);
        let open = Arc::new(AtomicBool::new(true));

        // Startup sweep, before callers see the store.
        {
            let inner = Arc::clone(&inner);
            let summary = tokio::task::spawn_blocking(move || inner.expire())
                .await
                .map_err(|e| StorageError::Task(e.to_string()))??;
            if summary.total() > 0 {
                info!(purged = summary.total(), "startup expiration sweep");
            }
        }

        let sweeper = config
            .sweep_interval
            .map(|interval| sweep::spawn_sweeper(Arc::clone(&inner), Arc::clone(&open), interval));

        Ok(Self {
            inner,
            open,
            sweeper: Arc::new(Mutex::new(sweeper)),
        })
    }

    /// Opens an in-memory store with the sweep timer disabled (for tests
    /// and ephemeral sessions).
    pub async fn open_in_memory(
        registry: SchemaRegistry,
        cipher: Arc<dyn RecordCipher>,
    ) -> StorageResult<Self> {
        Self::open(
            StoreConfig {
                path: None,
                sweep_interval: None,
            },
            registry,
            cipher,
        )
        .await
    }

    /// Opens the store with a cipher chosen by the `enable_encryption` flag:
    /// an ephemeral master-key cipher, or passthrough. Callers that manage
    /// key material themselves should use [`open`](Self::open) directly.
    pub async fn initialize(
        config: StoreConfig,
        registry: SchemaRegistry,
        enable_encryption: bool,
    ) -> StorageResult<Self> {
        let cipher: Arc<dyn RecordCipher> = if enable_encryption {
            Arc::new(MasterKeyCipher::ephemeral())
        } else {
            Arc::new(PassthroughCipher)
        };
        Self::open(config, registry, cipher).await
    }

    /// Stops the sweep timer and marks the store closed; any later call
    /// fails with [`StorageError::NotInitialized`].
    pub async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// The schema registry this store was opened with.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    /// The cipher this store was opened with.
    #[must_use]
    pub fn cipher(&self) -> &Arc<dyn RecordCipher> {
        &self.inner.cipher
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    async fn run_blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreInner) -> StorageResult<T> + Send + 'static,
    {
        self.ensure_open()?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Creates a record at version 1 and enqueues a `create` outbox entry.
    ///
    /// Fails with [`StorageError::Duplicate`] when a live or soft-deleted
    /// record with this id already exists. Returns the record with its
    /// plaintext payload.
    pub async fn create(
        &self,
        record_type: &str,
        id: &str,
        payload: Value,
    ) -> StorageResult<Record> {
        let (record_type, id) = (record_type.to_string(), id.to_string());
        self.run_blocking(move |inner| inner.create(&record_type, &id, payload))
            .await
    }

    /// Reads a record. Returns `None` when absent or soft-deleted; otherwise
    /// the payload is revealed (decrypted) before returning.
    pub async fn read(&self, record_type: &str, id: &str) -> StorageResult<Option<Record>> {
        let (record_type, id) = (record_type.to_string(), id.to_string());
        self.run_blocking(move |inner| inner.read(&record_type, &id))
            .await
    }

    /// Updates a record: version +1, fresh `updated_at`, re-protected
    /// payload, one `update` outbox entry.
    pub async fn update(
        &self,
        record_type: &str,
        id: &str,
        payload: Value,
    ) -> StorageResult<Record> {
        let (record_type, id) = (record_type.to_string(), id.to_string());
        self.run_blocking(move |inner| inner.update(&record_type, &id, payload, None))
            .await
    }

    /// Like [`update`](Self::update) but with an optimistic concurrency
    /// check: fails with [`StorageError::VersionConflict`] when the stored
    /// version no longer equals `expected_version`.
    pub async fn update_checked(
        &self,
        record_type: &str,
        id: &str,
        payload: Value,
        expected_version: i64,
    ) -> StorageResult<Record> {
        let (record_type, id) = (record_type.to_string(), id.to_string());
        self.run_blocking(move |inner| {
            inner.update(&record_type, &id, payload, Some(expected_version))
        })
        .await
    }

    /// Soft-deletes a record and enqueues a `delete` outbox entry.
    /// Idempotent: deleting an absent or already-deleted record is a no-op.
    pub async fn delete(&self, record_type: &str, id: &str) -> StorageResult<()> {
        let (record_type, id) = (record_type.to_string(), id.to_string());
        self.run_blocking(move |inner| inner.delete(&record_type, &id))
            .await
    }

    /// Runs one expiration sweep immediately and returns what it purged.
    pub async fn expire(&self) -> StorageResult<sweep::ExpireSummary> {
        self.run_blocking(|inner| inner.expire()).await
    }

    /// Read-only counts per type plus the outstanding outbox size.
    pub async fn stats(&self) -> StorageResult<StoreStats> {
        self.run_blocking(|inner| inner.stats()).await
    }

    /// Physically removes every record, index row and queue entry.
    pub async fn clear_all(&self) -> StorageResult<()> {
        self.run_blocking(|inner| inner.clear_all()).await
    }

    // ── Outbox (driver-facing) ──────────────────────────────────

    /// All outbox entries not yet completed, oldest first.
    pub async fn pending_sync_entries(&self) -> StorageResult<Vec<chartbase_model::SyncQueueEntry>> {
        self.run_blocking(|inner| inner.pending_entries()).await
    }

    /// Marks an entry as in flight.
    pub async fn mark_syncing(&self, entry_id: i64) -> StorageResult<()> {
        self.run_blocking(move |inner| inner.mark_syncing(entry_id))
            .await
    }

    /// Marks an entry delivered; when it was the record's last outstanding
    /// entry, the record's `sync_status` flips to `synced`.
    pub async fn mark_completed(&self, entry_id: i64) -> StorageResult<()> {
        self.run_blocking(move |inner| inner.mark_completed(entry_id))
            .await
    }

    /// Records a failed delivery attempt; the entry stays in the pending
    /// feed for the driver to retry.
    pub async fn mark_failed(&self, entry_id: i64, error: &str) -> StorageResult<()> {
        let error = error.to_string();
        self.run_blocking(move |inner| inner.mark_failed(entry_id, &error))
            .await
    }

    // ── Query-engine support ────────────────────────────────────

    /// All live (not soft-deleted) records of a type, in protected form.
    pub async fn live_records_protected(&self, record_type: &str) -> StorageResult<Vec<Record>> {
        let record_type = record_type.to_string();
        self.run_blocking(move |inner| inner.live_protected(&record_type))
            .await
    }

    /// Live records of a type whose indexed `field_path` renders to one of
    /// `values`, in protected form. Used for candidate narrowing only; the
    /// query engine re-evaluates every predicate on the result.
    pub async fn candidates_by_index(
        &self,
        record_type: &str,
        field_path: &str,
        values: Vec<String>,
    ) -> StorageResult<Vec<Record>> {
        let (record_type, field_path) = (record_type.to_string(), field_path.to_string());
        self.run_blocking(move |inner| inner.by_index(&record_type, &field_path, &values))
            .await
    }

    /// Decrypts a protected record's payload (CPU-only, no I/O).
    #[must_use]
    pub fn reveal_record(&self, mut record: Record) -> Record {
        if let Some(info) = record.encryption.as_ref() {
            record.payload = self.inner.cipher.reveal(&record.payload, info);
        }
        record
    }
}

pub(crate) fn init_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            record_type TEXT NOT NULL,
            id TEXT NOT NULL,
            payload TEXT NOT NULL,
            version INTEGER NOT NULL,
            algorithm TEXT,
            encrypted_fields TEXT,
            search_hashes TEXT NOT NULL DEFAULT '{}',
            sync_status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            expires_at INTEGER,
            PRIMARY KEY (record_type, id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_type_updated
            ON records(record_type, updated_at);

        CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT NOT NULL,
            record_type TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload_snapshot TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status);

        CREATE TABLE IF NOT EXISTS record_index (
            record_type TEXT NOT NULL,
            record_id TEXT NOT NULL,
            field_path TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (record_type, record_id, field_path)
        );

        CREATE INDEX IF NOT EXISTS idx_record_index_lookup
            ON record_index(record_type, field_path, value);
        ",
    )?;
    Ok(())
}

impl StoreInner {
    fn schema(&self, record_type: &str) -> StorageResult<&RecordSchema> {
        self.registry
            .get(record_type)
            .ok_or_else(|| StorageError::UnsupportedType(record_type.to_string()))
    }

    fn expires_at(schema: &RecordSchema, now: i64) -> Option<i64> {
        schema
            .expires()
            .then(|| now + i64::from(schema.retention_days) * MS_PER_DAY)
    }

    pub(crate) fn create(
        &self,
        record_type: &str,
        id: &str,
        payload: Value,
    ) -> StorageResult<Record> {
        let schema = self.schema(record_type)?;
        let now = now_ms();
        let expires_at = Self::expires_at(schema, now);
        let protected = self.cipher.protect(&payload, &schema.encrypted_fields)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT version FROM records WHERE record_type = ?1 AND id = ?2",
                params![record_type, id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(none_if_no_rows)?;
        if existing.is_some() {
            return Err(StorageError::Duplicate {
                record_type: record_type.to_string(),
                id: id.to_string(),
            });
        }

        insert_record_row(&tx, record_type, id, &protected, 1, now, now, expires_at)?;
        write_index_rows(&tx, schema, id, &payload, &protected, self.cipher.is_active())?;
        queue::enqueue(
            &tx,
            record_type,
            id,
            QueueOperation::Create,
            &protected.payload,
            now,
        )?;

        tx.commit()?;
        debug!(record_type, id, "created record");

        Ok(assemble_record(
            record_type, id, payload, 1, &protected, now, now, expires_at,
        ))
    }

    pub(crate) fn read(&self, record_type: &str, id: &str) -> StorageResult<Option<Record>> {
        // Validates the type even when the record is absent.
        self.schema(record_type)?;

        let conn = self.conn.lock().unwrap();
        let row = fetch_record_row(&conn, record_type, id)?;
        drop(conn);

        let Some(row) = row else { return Ok(None) };
        let mut record = record_from_row(row)?;
        if record.is_deleted() {
            return Ok(None);
        }
        if let Some(info) = record.encryption.as_ref() {
            record.payload = self.cipher.reveal(&record.payload, info);
        }
        Ok(Some(record))
    }

    pub(crate) fn update(
        &self,
        record_type: &str,
        id: &str,
        payload: Value,
        expected_version: Option<i64>,
    ) -> StorageResult<Record> {
        let schema = self.schema(record_type)?;
        let now = now_ms();
        let expires_at = Self::expires_at(schema, now);
        let protected = self.cipher.protect(&payload, &schema.encrypted_fields)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current: Option<(i64, i64, Option<i64>)> = tx
            .query_row(
                "SELECT version, created_at, deleted_at FROM records \
                 WHERE record_type = ?1 AND id = ?2",
                params![record_type, id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map(Some)
            .or_else(none_if_no_rows)?;

        let (version, created_at) = match current {
            None | Some((_, _, Some(_))) => {
                return Err(StorageError::NotFound {
                    record_type: record_type.to_string(),
                    id: id.to_string(),
                })
            }
            Some((version, created_at, None)) => (version, created_at),
        };

        if let Some(expected) = expected_version {
            if version != expected {
                return Err(StorageError::VersionConflict {
                    record_type: record_type.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: version,
                });
            }
        }

        let new_version = version + 1;
        tx.execute(
            "UPDATE records SET payload = ?3, version = ?4, algorithm = ?5, \
             encrypted_fields = ?6, search_hashes = ?7, sync_status = ?8, \
             updated_at = ?9, expires_at = ?10 \
             WHERE record_type = ?1 AND id = ?2 AND version = ?11",
            params![
                record_type,
                id,
                protected.payload.to_string(),
                new_version,
                protected.encryption.as_ref().map(|i| i.algorithm.clone()),
                encrypted_fields_json(&protected)?,
                serde_json::to_string(&protected.search_hashes)?,
                SyncStatus::Pending.as_str(),
                now,
                expires_at,
                version,
            ],
        )?;
        write_index_rows(&tx, schema, id, &payload, &protected, self.cipher.is_active())?;
        queue::enqueue(
            &tx,
            record_type,
            id,
            QueueOperation::Update,
            &protected.payload,
            now,
        )?;

        tx.commit()?;
        debug!(record_type, id, version = new_version, "updated record");

        Ok(assemble_record(
            record_type,
            id,
            payload,
            new_version,
            &protected,
            created_at,
            now,
            expires_at,
        ))
    }

    pub(crate) fn delete(&self, record_type: &str, id: &str) -> StorageResult<()> {
        self.schema(record_type)?;
        let now = now_ms();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current: Option<Option<i64>> = tx
            .query_row(
                "SELECT deleted_at FROM records WHERE record_type = ?1 AND id = ?2",
                params![record_type, id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(none_if_no_rows)?;

        match current {
            // Absent or already soft-deleted: idempotent no-op, no queue entry.
            None | Some(Some(_)) => return Ok(()),
            Some(None) => {}
        }

        tx.execute(
            "UPDATE records SET deleted_at = ?3, sync_status = ?4 \
             WHERE record_type = ?1 AND id = ?2",
            params![record_type, id, now, SyncStatus::Pending.as_str()],
        )?;
        tx.execute(
            "DELETE FROM record_index WHERE record_type = ?1 AND record_id = ?2",
            params![record_type, id],
        )?;
        queue::enqueue(&tx, record_type, id, QueueOperation::Delete, &Value::Null, now)?;

        tx.commit()?;
        debug!(record_type, id, "soft-deleted record");
        Ok(())
    }

    pub(crate) fn stats(&self) -> StorageResult<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT record_type, \
             SUM(CASE WHEN deleted_at IS NULL THEN 1 ELSE 0 END), \
             SUM(CASE WHEN deleted_at IS NULL THEN 0 ELSE 1 END) \
             FROM records GROUP BY record_type",
        )?;
        let rows: Vec<(String, i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let pending_queue_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status != 'completed'",
            [],
            |row| row.get(0),
        )?;

        let mut records = BTreeMap::new();
        for (record_type, live, soft_deleted) in rows {
            records.insert(record_type, TypeCounts { live, soft_deleted });
        }

        Ok(StoreStats {
            records,
            pending_queue_entries,
        })
    }

    pub(crate) fn clear_all(&self) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM record_index", [])?;
        tx.execute("DELETE FROM sync_queue", [])?;
        tx.execute("DELETE FROM records", [])?;
        tx.commit()?;
        info!("cleared all records and queue entries");
        Ok(())
    }

    pub(crate) fn live_protected(&self, record_type: &str) -> StorageResult<Vec<Record>> {
        self.schema(record_type)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records \
             WHERE record_type = ?1 AND deleted_at IS NULL ORDER BY id"
        ))?;
        let rows: Vec<RecordRow> = stmt
            .query_map(params![record_type], map_record_row)?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(record_from_row).collect()
    }

    pub(crate) fn by_index(
        &self,
        record_type: &str,
        field_path: &str,
        values: &[String],
    ) -> StorageResult<Vec<Record>> {
        self.schema(record_type)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records r \
             WHERE r.record_type = ? AND r.deleted_at IS NULL AND r.id IN ( \
                 SELECT i.record_id FROM record_index i \
                 WHERE i.record_type = ? AND i.field_path = ? AND i.value IN ({placeholders}) \
             ) ORDER BY r.id"
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let bound = [record_type, record_type, field_path]
            .into_iter()
            .map(str::to_string)
            .chain(values.iter().cloned());
        let rows: Vec<RecordRow> = stmt
            .query_map(rusqlite::params_from_iter(bound), map_record_row)?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(record_from_row).collect()
    }
}

fn none_if_no_rows<T>(err: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

pub(crate) fn map_queue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

pub(crate) fn queue_rows_to_entries(
    rows: Vec<QueueRow>,
) -> StorageResult<Vec<chartbase_model::SyncQueueEntry>> {
    rows.into_iter().map(queue_entry_from_row).collect()
}

fn fetch_record_row(
    conn: &Connection,
    record_type: &str,
    id: &str,
) -> StorageResult<Option<RecordRow>> {
    conn.query_row(
        &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_type = ?1 AND id = ?2"),
        params![record_type, id],
        map_record_row,
    )
    .map(Some)
    .or_else(none_if_no_rows)
    .map_err(Into::into)
}

fn encrypted_fields_json(protected: &ProtectedPayload) -> StorageResult<Option<String>> {
    protected
        .encryption
        .as_ref()
        .map(|info| serde_json::to_string(&info.fields).map_err(Into::into))
        .transpose()
}

#[allow(clippy::too_many_arguments)]
fn insert_record_row(
    conn: &Connection,
    record_type: &str,
    id: &str,
    protected: &ProtectedPayload,
    version: i64,
    created_at: i64,
    updated_at: i64,
    expires_at: Option<i64>,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO records (record_type, id, payload, version, algorithm, \
         encrypted_fields, search_hashes, sync_status, created_at, updated_at, \
         deleted_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11)",
        params![
            record_type,
            id,
            protected.payload.to_string(),
            version,
            protected.encryption.as_ref().map(|i| i.algorithm.clone()),
            encrypted_fields_json(protected)?,
            serde_json::to_string(&protected.search_hashes)?,
            SyncStatus::Pending.as_str(),
            created_at,
            updated_at,
            expires_at,
        ],
    )?;
    Ok(())
}

/// Rewrites the `record_index` rows for one record from its plaintext
/// payload (clear fields) and search hashes (encrypted fields).
fn write_index_rows(
    conn: &Connection,
    schema: &RecordSchema,
    id: &str,
    plaintext: &Value,
    protected: &ProtectedPayload,
    cipher_active: bool,
) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM record_index WHERE record_type = ?1 AND record_id = ?2",
        params![schema.record_type, id],
    )?;

    for path in &schema.indexed_fields {
        let value = if cipher_active && schema.is_encrypted(path.as_str()) {
            // Only string-valued encrypted fields have a hash to index.
            protected.search_hashes.get(path.as_str()).cloned()
        } else {
            path.get(plaintext).and_then(index_value)
        };
        if let Some(value) = value {
            conn.execute(
                "INSERT INTO record_index (record_type, record_id, field_path, value) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![schema.record_type, id, path.as_str(), value],
            )?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn assemble_record(
    record_type: &str,
    id: &str,
    plaintext_payload: Value,
    version: i64,
    protected: &ProtectedPayload,
    created_at: i64,
    updated_at: i64,
    expires_at: Option<i64>,
) -> Record {
    Record {
        id: id.to_string(),
        record_type: record_type.to_string(),
        payload: plaintext_payload,
        version,
        encryption: protected.encryption.clone(),
        search_hashes: protected.search_hashes.clone(),
        sync_status: SyncStatus::Pending,
        created_at,
        updated_at,
        deleted_at: None,
        expires_at,
    }
}
