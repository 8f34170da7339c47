//! Conflict resolution between a local record and its remote counterpart.
//!
//! Resolution always goes through the store's normal update path, so the
//! winning payload gets a fresh version and its own outbox entry like any
//! other write. There is no side channel that mutates a record silently.

use crate::error::{SyncError, SyncResult};
use chartbase_model::Record;
use chartbase_storage::RecordStore;
use chartbase_types::now_ms;
use serde_json::{json, Value};
use tracing::info;

/// How to settle a divergence detected by the sync driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Keep the local payload.
    Local,
    /// Take the remote payload.
    Remote,
    /// Take the remote payload and stamp it with merge provenance.
    Merge,
}

/// Applies a [`ResolutionStrategy`] to a conflicting record pair.
#[derive(Clone)]
pub struct ConflictResolver {
    store: RecordStore,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Settles the conflict and persists the winner.
    ///
    /// Both sides must describe the same record (same type and id). Returns
    /// the stored record: version bumped, queued for upload.
    pub async fn resolve(
        &self,
        local: &Record,
        remote: &Record,
        strategy: ResolutionStrategy,
    ) -> SyncResult<Record> {
        if local.record_type != remote.record_type || local.id != remote.id {
            return Err(SyncError::MismatchedRecords {
                local: format!("{}/{}", local.record_type, local.id),
                remote: format!("{}/{}", remote.record_type, remote.id),
            });
        }

        let payload = match strategy {
            ResolutionStrategy::Local => local.payload.clone(),
            ResolutionStrategy::Remote => remote.payload.clone(),
            ResolutionStrategy::Merge => merged_payload(&remote.payload),
        };

        let resolved = self
            .store
            .update(&local.record_type, &local.id, payload)
            .await?;
        info!(
            record_type = resolved.record_type.as_str(),
            record_id = resolved.id.as_str(),
            strategy = ?strategy,
            version = resolved.version,
            "conflict resolved"
        );
        Ok(resolved)
    }
}

/// Remote payload plus a `_merge` provenance object. Non-object payloads are
/// taken as-is; there is nowhere to attach provenance.
fn merged_payload(remote: &Value) -> Value {
    let mut payload = remote.clone();
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(
            "_merge".to_string(),
            json!({
                "resolved_by": "auto-merge",
                "resolved_at": now_ms(),
            }),
        );
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_stamps_provenance_on_objects() {
        let merged = merged_payload(&json!({"status": "final"}));
        assert_eq!(merged.pointer("/status"), Some(&json!("final")));
        assert_eq!(
            merged.pointer("/_merge/resolved_by"),
            Some(&json!("auto-merge"))
        );
        assert!(merged.pointer("/_merge/resolved_at").unwrap().is_i64());
    }

    #[test]
    fn merge_leaves_non_objects_alone() {
        assert_eq!(merged_payload(&json!([1, 2])), json!([1, 2]));
        assert_eq!(merged_payload(&Value::Null), Value::Null);
    }
}
