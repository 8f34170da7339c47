//! Error types for the query engine.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while building or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A field path in a filter, sort, or include is malformed.
    #[error("invalid field path: {0}")]
    InvalidPath(#[from] chartbase_model::ModelError),

    /// Encrypted fields only support equality comparison; the deterministic
    /// search hash preserves nothing about ordering or substrings.
    #[error("operator {operator} is not supported on encrypted field {path}")]
    EncryptedFieldOperator { path: String, operator: String },

    /// Encrypted fields cannot be sort keys.
    #[error("cannot sort on encrypted field {0}")]
    EncryptedFieldSort(String),

    /// Failure in the underlying store.
    #[error(transparent)]
    Storage(#[from] chartbase_storage::StorageError),
}
