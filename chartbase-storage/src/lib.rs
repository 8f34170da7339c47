//! SQLite-backed storage engine for Chartbase.
//!
//! Provides the durable, offline-first record store: CRUD with soft delete
//! and strict version monotonicity, field-level encryption through
//! `chartbase-crypto`, schema-driven index rows for query narrowing, a
//! retention-based expiration sweep, and the sync outbox — every mutation
//! commits its record, index rows and queue entry in a single transaction.
//!
//! The query engine (`chartbase-query`) and the sync layer
//! (`chartbase-sync`) both sit on top of [`RecordStore`].

mod engine;
mod error;
mod queue;
mod rows;
mod sweep;

pub use engine::{RecordStore, StoreConfig, StoreStats, TypeCounts};
pub use error::{StorageError, StorageResult};
pub use rows::index_value;
pub use sweep::ExpireSummary;
