//! Expiration sweep.
//!
//! For every type with a finite retention policy, records whose `updated_at`
//! is older than `now - retention_days` are physically removed, soft-deleted
//! or not. The sweep only ever sees committed rows and removes each record's
//! rows in one transaction, so it is safe to run concurrently with ordinary
//! reads and writes.

use crate::engine::StoreInner;
use crate::error::StorageResult;
use chartbase_types::now_ms;
use rusqlite::params;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MS_PER_DAY: i64 = 86_400_000;

/// What one sweep removed.
#[derive(Debug, Clone, Default)]
pub struct ExpireSummary {
    /// Physically purged record count per type.
    pub purged: BTreeMap<String, usize>,
}

impl ExpireSummary {
    /// Total records purged across all types.
    #[must_use]
    pub fn total(&self) -> usize {
        self.purged.values().sum()
    }
}

impl StoreInner {
    pub(crate) fn expire(&self) -> StorageResult<ExpireSummary> {
        let now = now_ms();
        let mut summary = ExpireSummary::default();

        // Collect first: the registry iterator must not be held across the
        // connection lock in future refactors.
        let expiring: Vec<(String, i64)> = self
            .registry
            .expiring_schemas()
            .map(|s| (s.record_type.clone(), i64::from(s.retention_days) * MS_PER_DAY))
            .collect();

        let mut conn = self.conn.lock().unwrap();
        for (record_type, retention_ms) in expiring {
            let cutoff = now - retention_ms;
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM record_index WHERE record_type = ?1 AND record_id IN \
                 (SELECT id FROM records WHERE record_type = ?1 AND updated_at < ?2)",
                params![record_type, cutoff],
            )?;
            let purged = tx.execute(
                "DELETE FROM records WHERE record_type = ?1 AND updated_at < ?2",
                params![record_type, cutoff],
            )?;
            tx.commit()?;

            if purged > 0 {
                info!(%record_type, purged, "expired records past retention");
                summary.purged.insert(record_type, purged);
            }
        }

        Ok(summary)
    }
}

/// Spawns the periodic sweep task. Stops when the store closes.
pub(crate) fn spawn_sweeper(
    inner: Arc<StoreInner>,
    open: Arc<AtomicBool>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would duplicate the startup sweep.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !open.load(Ordering::SeqCst) {
                break;
            }
            let inner = Arc::clone(&inner);
            let result = tokio::task::spawn_blocking(move || inner.expire()).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "expiration sweep failed"),
                Err(err) => warn!(error = %err, "expiration sweep task panicked"),
            }
        }
    })
}
