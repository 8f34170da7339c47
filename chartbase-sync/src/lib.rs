//! Sync surface for Chartbase stores.
//!
//! Two pieces, both thin by design:
//!
//! - [`SyncOutbox`] — the feed an external sync driver drains: pending
//!   entries in mutation order, plus the ack/fault transitions
//! - [`ConflictResolver`] — settles a local/remote divergence with a
//!   [`ResolutionStrategy`] and persists the winner through the store's
//!   regular update path
//!
//! Transport, scheduling, and retry policy live in the driver, not here.

mod error;
mod outbox;
mod resolver;

pub use error::{SyncError, SyncResult};
pub use outbox::SyncOutbox;
pub use resolver::{ConflictResolver, ResolutionStrategy};
