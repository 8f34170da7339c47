//! Outbox operations.
//!
//! Entries are appended by the CRUD paths inside the same transaction as the
//! record mutation; everything else here is the read/ack surface consumed by
//! the external sync driver. No retry timing or transport lives in this
//! crate.

use crate::engine::{map_queue_row, queue_rows_to_entries, StoreInner};
use crate::error::{StorageError, StorageResult};
use crate::rows::QUEUE_COLUMNS;
use chartbase_model::SyncQueueEntry;
use chartbase_types::{now_ms, QueueOperation, SyncStatus};
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::debug;

/// Appends one outbox entry. Must be called inside the transaction that
/// writes the record mutation it describes.
pub(crate) fn enqueue(
    conn: &Connection,
    record_type: &str,
    record_id: &str,
    operation: QueueOperation,
    snapshot: &Value,
    now: i64,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO sync_queue (record_id, record_type, operation, payload_snapshot, \
         status, attempts, created_at) VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)",
        params![
            record_id,
            record_type,
            operation.as_str(),
            snapshot.to_string(),
            now,
        ],
    )?;
    Ok(())
}

impl StoreInner {
    pub(crate) fn pending_entries(&self) -> StorageResult<Vec<SyncQueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE status != 'completed' ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], map_queue_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        queue_rows_to_entries(rows)
    }

    pub(crate) fn mark_syncing(&self, entry_id: i64) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sync_queue SET status = 'syncing' WHERE id = ?1 AND status != 'completed'",
            params![entry_id],
        )?;
        if changed == 0 {
            return Err(StorageError::QueueEntryNotFound(entry_id));
        }
        Ok(())
    }

    /// Marks an entry delivered. When no outstanding entries remain for the
    /// record, its `sync_status` flips to `synced`.
    pub(crate) fn mark_completed(&self, entry_id: i64) -> StorageResult<()> {
        let now = now_ms();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let target: Option<(String, String)> = tx
            .query_row(
                "SELECT record_type, record_id FROM sync_queue WHERE id = ?1",
                params![entry_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let Some((record_type, record_id)) = target else {
            return Err(StorageError::QueueEntryNotFound(entry_id));
        };

        tx.execute(
            "UPDATE sync_queue SET status = 'completed', completed_at = ?2 WHERE id = ?1",
            params![entry_id, now],
        )?;

        let outstanding: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sync_queue \
             WHERE record_type = ?1 AND record_id = ?2 AND status != 'completed'",
            params![record_type, record_id],
            |row| row.get(0),
        )?;
        if outstanding == 0 {
            // Full delivery also clears an earlier failed attempt; only
            // `conflict` survives, until resolution issues a new update.
            tx.execute(
                "UPDATE records SET sync_status = ?3 \
                 WHERE record_type = ?1 AND id = ?2 AND sync_status IN (?4, ?5)",
                params![
                    record_type,
                    record_id,
                    SyncStatus::Synced.as_str(),
                    SyncStatus::Pending.as_str(),
                    SyncStatus::Error.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        debug!(entry_id, %record_type, %record_id, "outbox entry completed");
        Ok(())
    }

    /// Records a failed delivery attempt; the entry is retained for retry.
    pub(crate) fn mark_failed(&self, entry_id: i64, error: &str) -> StorageResult<()> {
        let now = now_ms();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE sync_queue SET status = 'failed', attempts = attempts + 1, \
             last_attempt_at = ?2, last_error = ?3 WHERE id = ?1 AND status != 'completed'",
            params![entry_id, now, error],
        )?;
        if changed == 0 {
            return Err(StorageError::QueueEntryNotFound(entry_id));
        }

        tx.execute(
            "UPDATE records SET sync_status = ?1 WHERE (record_type, id) IN \
             (SELECT record_type, record_id FROM sync_queue WHERE id = ?2)",
            params![SyncStatus::Error.as_str(), entry_id],
        )?;

        tx.commit()?;
        debug!(entry_id, error, "outbox entry failed");
        Ok(())
    }
}
