//! Core record model for Chartbase.
//!
//! Defines the universal types that all Chartbase subsystems depend on:
//! - [`Record`] — a typed, identified, versioned document with optional
//!   field-level encryption metadata
//! - [`SyncQueueEntry`] — one outbox entry per successful mutation
//! - [`RecordSchema`] / [`SchemaRegistry`] — per-type index fields, encrypted
//!   fields and retention policy, loaded once at initialization
//! - [`FieldPath`] — a compiled, validated JSON-pointer accessor
//!
//! These types form the contract between the encryption subsystem, the
//! storage engine, the query engine and the sync layer.

mod outbox;
mod path;
mod record;
mod schema;

pub use outbox::SyncQueueEntry;
pub use path::FieldPath;
pub use record::{EncryptionInfo, Record};
pub use schema::{RecordSchema, SchemaBuilder, SchemaRegistry};

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors that can occur when building model configuration.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A field path failed validation at configuration time.
    #[error("invalid field path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Two schemas were registered for the same record type.
    #[error("duplicate schema for record type {0:?}")]
    DuplicateSchema(String),
}
