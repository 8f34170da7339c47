//! Driver-facing view of the sync queue.
//!
//! The store appends entries as a side effect of every mutation; an external
//! sync driver owns scheduling and transport. This wrapper is the whole
//! contract between the two: take the pending feed, attempt delivery, ack or
//! fault each entry. Retry timing and backoff are the driver's problem.

use crate::error::SyncResult;
use chartbase_model::SyncQueueEntry;
use chartbase_storage::RecordStore;

/// Handle the sync driver drains the queue through.
#[derive(Clone)]
pub struct SyncOutbox {
    store: RecordStore,
}

impl SyncOutbox {
    #[must_use]
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// All entries not yet delivered, oldest first. Failed entries stay in
    /// the feed until a later attempt completes them.
    pub async fn pending_entries(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.store.pending_sync_entries().await?)
    }

    /// Marks an entry as in flight.
    pub async fn mark_syncing(&self, entry_id: i64) -> SyncResult<()> {
        Ok(self.store.mark_syncing(entry_id).await?)
    }

    /// Acks a delivered entry; it leaves the pending feed. When it was the
    /// record's last outstanding entry the record flips to `Synced`.
    pub async fn mark_completed(&self, entry_id: i64) -> SyncResult<()> {
        Ok(self.store.mark_completed(entry_id).await?)
    }

    /// Records a failed attempt. The entry is retained for retry with
    /// `attempts` incremented and the error kept for inspection.
    pub async fn mark_failed(&self, entry_id: i64, error: &str) -> SyncResult<()> {
        Ok(self.store.mark_failed(entry_id, error).await?)
    }
}
