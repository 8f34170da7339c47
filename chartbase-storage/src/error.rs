//! Error types for the storage engine.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store has not been opened, or has been closed.
    #[error("store is not initialized")]
    NotInitialized,

    /// Create on an id that already exists (live or soft-deleted).
    #[error("duplicate record: {record_type}/{id}")]
    Duplicate { record_type: String, id: String },

    /// Update/operate on an absent or soft-deleted record.
    #[error("record not found: {record_type}/{id}")]
    NotFound { record_type: String, id: String },

    /// No schema registered for this record type.
    #[error("unknown record type: {0}")]
    UnsupportedType(String),

    /// Optimistic concurrency check failed: another writer got there first.
    #[error("version conflict on {record_type}/{id}: expected {expected}, found {actual}")]
    VersionConflict {
        record_type: String,
        id: String,
        expected: i64,
        actual: i64,
    },

    /// Sync queue entry does not exist.
    #[error("sync queue entry not found: {0}")]
    QueueEntryNotFound(i64),

    /// Underlying database failure; aborts the one operation it hit.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Encryption layer failure.
    #[error("encryption error: {0}")]
    Encryption(#[from] chartbase_crypto::CryptoError),

    /// A persisted row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A blocking task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}
