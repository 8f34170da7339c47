//! Monotonic wall-clock timestamps.
//!
//! Record timestamps are milliseconds since the Unix epoch, with a
//! process-wide monotonic guarantee: two successive calls never return the
//! same value and never go backwards, even if the system clock steps. This
//! keeps `created_at`/`updated_at` usable as a total order within one process.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_MS: AtomicI64 = AtomicI64::new(0);

/// Returns the current wall-clock time in milliseconds since the Unix epoch,
/// bumped forward if necessary so the sequence is strictly increasing within
/// this process.
#[must_use]
pub fn now_ms() -> i64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let mut prev = LAST_MS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev + 1);
        match LAST_MS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}
