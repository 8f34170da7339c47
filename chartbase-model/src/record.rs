use chartbase_types::{now_ms, SyncStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata describing which payload fields are currently ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// Algorithm/version tag, e.g. `"chacha20poly1305/v1"`.
    pub algorithm: String,
    /// JSON-pointer paths whose values were replaced by ciphertext.
    pub fields: Vec<String>,
}

/// A typed, identified, versioned document in the record store.
///
/// The `payload` is the domain object; when encryption is enabled, the field
/// paths listed in `encryption` hold base64 ciphertext instead of plaintext.
/// A record with `deleted_at` set is logically absent from all reads and
/// searches but physically retained until the expiration sweep or an
/// explicit purge removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique within `record_type`.
    pub id: String,
    /// Selects the schema (indexes, encrypted fields, retention).
    pub record_type: String,
    /// The domain object.
    pub payload: Value,
    /// Starts at 1, increments by exactly 1 on every successful update.
    pub version: i64,
    /// Present only when at least one field is currently encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionInfo>,
    /// Field path → deterministic hash of the plaintext, for encrypted
    /// string-valued fields only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub search_hashes: BTreeMap<String, String>,
    /// Delivery state of the latest local mutation.
    pub sync_status: SyncStatus,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
    /// Presence marks a soft delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// Derived from the type's retention policy at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Record {
    /// Creates a fresh, never-persisted record at version 1.
    #[must_use]
    pub fn new(record_type: impl Into<String>, id: impl Into<String>, payload: Value) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            record_type: record_type.into(),
            payload,
            version: 1,
            encryption: None,
            search_hashes: BTreeMap::new(),
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            expires_at: None,
        }
    }

    /// Whether this record is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
