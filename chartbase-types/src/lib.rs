//! Core type definitions for Chartbase.
//!
//! This crate defines the fundamental, domain-agnostic types used throughout
//! the record store:
//! - Monotonic wall-clock timestamps (millisecond precision)
//! - Record sync status
//! - Outbox operation and entry status enums
//!
//! Domain-specific shapes (records, schemas, queue entries) live in
//! `chartbase-model`, not here.

mod status;
mod timestamp;

pub use status::{QueueEntryStatus, QueueOperation, SyncStatus};
pub use timestamp::now_ms;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown enum value: {0}")]
    UnknownValue(String),
}
