//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while draining the outbox or resolving conflicts.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The two sides of a conflict do not describe the same record.
    #[error("conflict sides disagree: local {local}, remote {remote}")]
    MismatchedRecords { local: String, remote: String },

    /// Failure in the underlying store.
    #[error(transparent)]
    Storage(#[from] chartbase_storage::StorageError),
}
