//! In-memory work store.
//!
//! Same semantics as the Postgres store, without persistence. Used by the
//! test suite and for running the pipeline without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::WorkStore;
use crate::error::{Error, Result};
use crate::model::work::{JoinRequest, Status, WorkId, WorkItem, validate_transition};

#[derive(Debug, Default)]
struct StoreState {
    items: HashMap<WorkId, Entry>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry {
    /// Insertion order, breaks ties between equal timestamps.
    seq: u64,
    item: WorkItem,
}

/// Thread-safe in-memory [`WorkStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Every mutation is a single assignment; a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every item, in enqueue order.
    pub fn all(&self) -> Vec<WorkItem> {
        let state = self.lock();
        let mut entries: Vec<&Entry> = state.items.values().collect();
        entries.sort_by_key(|e| (e.item.enqueued_at, e.seq));
        entries.into_iter().map(|e| e.item.clone()).collect()
    }

    /// Apply `mutate` to a pending item, or resolve the call against a
    /// terminal one: a repeat of the terminal transition is a no-op, anything
    /// else is rejected.
    fn update(
        &self,
        id: WorkId,
        to: Status,
        mutate: impl FnOnce(&mut WorkItem),
    ) -> Result<()> {
        let mut state = self.lock();
        let entry = state
            .items
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))?;
        let from = entry.item.status;

        if from.is_terminal() && from == to {
            return Ok(());
        }
        validate_transition(from, to)?;
        mutate(&mut entry.item);
        Ok(())
    }
}

#[async_trait]
impl WorkStore for MemoryStore {
    async fn enqueue(&self, request: JoinRequest) -> Result<WorkId> {
        let item = WorkItem::pending(request);
        let id = item.id;
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.items.insert(id, Entry { seq, item });
        Ok(id)
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<WorkItem>> {
        let state = self.lock();
        let mut pending: Vec<&Entry> = state
            .items
            .values()
            .filter(|e| e.item.status == Status::Pending)
            .collect();
        pending.sort_by_key(|e| (e.item.enqueued_at, e.seq));
        Ok(pending
            .into_iter()
            .take(limit)
            .map(|e| e.item.clone())
            .collect())
    }

    async fn mark_processed(&self, id: WorkId) -> Result<()> {
        self.update(id, Status::Processed, |item| {
            item.status = Status::Processed;
            item.processed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: WorkId, error: &str) -> Result<()> {
        self.update(id, Status::Failed, |item| {
            item.status = Status::Failed;
            item.retry_count += 1;
            item.last_error = Some(error.to_string());
            item.processed_at = Some(Utc::now());
        })
    }

    async fn increment_retry(&self, id: WorkId) -> Result<()> {
        self.update(id, Status::Pending, |item| {
            item.retry_count += 1;
        })
    }

    async fn get(&self, id: WorkId) -> Result<WorkItem> {
        self.lock()
            .items
            .get(&id)
            .map(|e| e.item.clone())
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }
}
