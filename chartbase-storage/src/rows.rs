//! Row ↔ model mapping for the SQLite tables.
//!
//! Rows are fetched as plain tuples inside the rusqlite closures and decoded
//! into model types afterwards, so JSON/enum decode failures surface as
//! [`StorageError::Corrupt`] instead of being swallowed by the driver.

use crate::error::{StorageError, StorageResult};
use chartbase_model::{EncryptionInfo, Record, SyncQueueEntry};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw `records` row, in SELECT column order.
pub(crate) type RecordRow = (
    String,         // record_type
    String,         // id
    String,         // payload
    i64,            // version
    Option<String>, // algorithm
    Option<String>, // encrypted_fields (JSON array)
    String,         // search_hashes (JSON object)
    String,         // sync_status
    i64,            // created_at
    i64,            // updated_at
    Option<i64>,    // deleted_at
    Option<i64>,    // expires_at
);

/// Column list matching [`RecordRow`].
pub(crate) const RECORD_COLUMNS: &str = "record_type, id, payload, version, algorithm, \
     encrypted_fields, search_hashes, sync_status, created_at, updated_at, deleted_at, expires_at";

pub(crate) fn record_from_row(row: RecordRow) -> StorageResult<Record> {
    let (
        record_type,
        id,
        payload,
        version,
        algorithm,
        encrypted_fields,
        search_hashes,
        sync_status,
        created_at,
        updated_at,
        deleted_at,
        expires_at,
    ) = row;

    let payload: Value = serde_json::from_str(&payload)?;
    let search_hashes: BTreeMap<String, String> = serde_json::from_str(&search_hashes)?;

    let encryption = match (algorithm, encrypted_fields) {
        (Some(algorithm), Some(fields)) => Some(EncryptionInfo {
            algorithm,
            fields: serde_json::from_str(&fields)?,
        }),
        (None, None) => None,
        _ => {
            return Err(StorageError::Corrupt(format!(
                "record {record_type}/{id}: algorithm and encrypted_fields must be set together"
            )))
        }
    };

    let sync_status = sync_status
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("record {record_type}/{id}: {e}")))?;

    Ok(Record {
        id,
        record_type,
        payload,
        version,
        encryption,
        search_hashes,
        sync_status,
        created_at,
        updated_at,
        deleted_at,
        expires_at,
    })
}

/// Raw `sync_queue` row, in SELECT column order.
pub(crate) type QueueRow = (
    i64,            // id
    String,         // record_id
    String,         // record_type
    String,         // operation
    String,         // payload_snapshot
    String,         // status
    i64,            // attempts
    Option<i64>,    // last_attempt_at
    Option<String>, // last_error
    i64,            // created_at
    Option<i64>,    // completed_at
);

/// Column list matching [`QueueRow`].
pub(crate) const QUEUE_COLUMNS: &str = "id, record_id, record_type, operation, payload_snapshot, \
     status, attempts, last_attempt_at, last_error, created_at, completed_at";

pub(crate) fn queue_entry_from_row(row: QueueRow) -> StorageResult<SyncQueueEntry> {
    let (
        id,
        record_id,
        record_type,
        operation,
        payload_snapshot,
        status,
        attempts,
        last_attempt_at,
        last_error,
        created_at,
        completed_at,
    ) = row;

    let corrupt = |e: chartbase_types::Error| StorageError::Corrupt(format!("queue entry {id}: {e}"));

    Ok(SyncQueueEntry {
        id,
        record_id,
        record_type,
        operation: operation.parse().map_err(corrupt)?,
        payload_snapshot: serde_json::from_str(&payload_snapshot)?,
        status: status.parse().map_err(corrupt)?,
        attempts,
        last_attempt_at,
        last_error,
        created_at,
        completed_at,
    })
}

/// Renders a payload scalar for the `record_index` table.
///
/// Only scalar values are indexable; arrays, objects and null return `None`
/// and the field is simply absent from the index for that record. The query
/// engine uses the same rendering for index lookups, so both sides must
/// always agree.
pub fn index_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_value_renders_scalars_only() {
        assert_eq!(index_value(&json!("female")), Some("female".to_string()));
        assert_eq!(index_value(&json!(42)), Some("42".to_string()));
        assert_eq!(index_value(&json!(true)), Some("true".to_string()));
        assert_eq!(index_value(&json!(null)), None);
        assert_eq!(index_value(&json!(["a"])), None);
        assert_eq!(index_value(&json!({"a": 1})), None);
    }

    #[test]
    fn record_row_with_mismatched_encryption_columns_is_corrupt() {
        let row: RecordRow = (
            "Patient".into(),
            "p1".into(),
            "{}".into(),
            1,
            Some("chacha20poly1305/v1".into()),
            None,
            "{}".into(),
            "pending".into(),
            1,
            1,
            None,
            None,
        );
        assert!(matches!(
            record_from_row(row),
            Err(StorageError::Corrupt(_))
        ));
    }
}
