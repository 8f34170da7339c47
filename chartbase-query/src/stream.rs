//! Pull-based batch cursor over query results.
//!
//! Repeatedly executes the query at increasing offsets until a short batch
//! signals the end. A cursor over unchanged data is restartable from the
//! start via [`RecordBatches::reset`]; it is not a live subscription and
//! never observes writes made after a batch was fetched.

use crate::builder::Query;
use crate::error::QueryResult;
use crate::exec::{QueryEngine, QueryHit};

/// Finite, non-parallel sequence of result batches.
pub struct RecordBatches {
    engine: QueryEngine,
    query: Query,
    batch_size: usize,
    offset: usize,
    done: bool,
}

impl RecordBatches {
    pub(crate) fn new(engine: QueryEngine, query: Query, batch_size: usize) -> Self {
        let offset = query.offset;
        Self {
            engine,
            query,
            batch_size: batch_size.max(1),
            offset,
            done: false,
        }
    }

    /// Fetches the next batch, or `None` once the sequence is exhausted.
    pub async fn next_batch(&mut self) -> QueryResult<Option<Vec<QueryHit>>> {
        if self.done {
            return Ok(None);
        }
        let mut query = self.query.clone();
        query.offset = self.offset;
        query.limit = Some(self.batch_size);

        let page = self.engine.execute(&query).await?;
        if page.hits.len() < self.batch_size {
            self.done = true;
        }
        if page.hits.is_empty() {
            return Ok(None);
        }
        self.offset += page.hits.len();
        Ok(Some(page.hits))
    }

    /// Rewinds to the query's original offset.
    pub fn reset(&mut self) {
        self.offset = self.query.offset;
        self.done = false;
    }
}

impl QueryEngine {
    /// Streams results in fixed-size batches starting at the query's offset.
    ///
    /// The query's own `limit` is ignored; the batch size governs paging.
    #[must_use]
    pub fn batches(&self, query: Query, batch_size: usize) -> RecordBatches {
        RecordBatches::new(self.clone(), query, batch_size)
    }
}
