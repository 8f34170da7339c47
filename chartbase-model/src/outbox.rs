use chartbase_types::{QueueEntryStatus, QueueOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One outbox entry, appended atomically with the record mutation it
/// describes.
///
/// Entries are produced only by the storage engine. The external sync driver
/// reads the pending feed and reports back via `mark_completed` /
/// `mark_failed`; nothing here schedules retries or talks to the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// Store-assigned, monotonically increasing.
    pub id: i64,
    pub record_id: String,
    pub record_type: String,
    pub operation: QueueOperation,
    /// The mutated value at enqueue time (protected form for create/update,
    /// `null` for delete).
    pub payload_snapshot: Value,
    pub status: QueueEntryStatus,
    /// Number of failed delivery attempts so far.
    pub attempts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}
