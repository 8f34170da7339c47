//! Query engine for Chartbase record stores.
//!
//! Callers describe what they want with a [`Query`] builder — ANDed filter
//! predicates, sort keys, pagination, and key-based includes — and the
//! [`QueryEngine`] runs it against a `RecordStore`:
//!
//! - soft-deleted records are never candidates
//! - at most one indexed equality predicate narrows the scan; every
//!   predicate is then re-checked against every candidate
//! - predicates on encrypted fields compare deterministic search hashes and
//!   therefore support equality only
//! - decryption happens only for records on the returned page; `count` and
//!   `exists` never decrypt
//!
//! [`RecordBatches`] wraps repeated execution into a pull-based cursor for
//! walking large result sets.

mod builder;
mod error;
mod exec;
mod stream;

pub use builder::{Filter, Include, Operator, Query, SortDirection, SortSpec};
pub use error::{QueryError, QueryResult};
pub use exec::{QueryEngine, QueryHit, QueryPage};
pub use stream::RecordBatches;
