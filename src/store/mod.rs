//! Work item store abstraction.
//!
//! The store is the only mutable state shared between the intake path
//! (producer) and the queue processor (consumer). Every mutation is a
//! single-row update keyed by id, guarded on the row still being
//! `Pending`, so no cross-row locking is needed.
//!
//! Point updates are idempotent: repeating the update that made an item
//! terminal is a no-op, while any other mutation of a terminal item is
//! rejected with [`Error::InvalidTransition`](crate::error::Error).

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::work::{JoinRequest, WorkId, WorkItem};

pub use memory::MemoryStore;

#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Insert a new `Pending` item with `retry_count = 0` and the current
    /// timestamp.
    async fn enqueue(&self, request: JoinRequest) -> Result<WorkId>;

    /// Up to `limit` pending items, oldest `enqueued_at` first. An empty
    /// batch means the queue is idle.
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<WorkItem>>;

    /// `Pending -> Processed`.
    async fn mark_processed(&self, id: WorkId) -> Result<()>;

    /// `Pending -> Failed`, recording `error` and counting the failed attempt.
    async fn mark_failed(&self, id: WorkId, error: &str) -> Result<()>;

    /// `Pending -> Pending` with `retry_count + 1`.
    async fn increment_retry(&self, id: WorkId) -> Result<()>;

    async fn get(&self, id: WorkId) -> Result<WorkItem>;
}
