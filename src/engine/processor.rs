//! Queue processor: the single long-running loop that drains pending work.
//!
//! Each cycle fetches the oldest pending items, runs them one by one through
//! the approval worker and writes the resulting state back to the store:
//!
//! ```text
//! Pending --approved--------------------------------> Processed
//! Pending --retryable, retries left-----------------> Pending (retry_count + 1)
//! Pending --retryable, exhausted | permanent--------> Failed
//! ```
//!
//! Retried items go back into the pending set rather than being kept in
//! place, so ordering across batches is best-effort FIFO.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{Instrument, error, info, warn};

use super::worker::{ApprovalOutcome, ApprovalWorker};
use crate::error::Result;
use crate::model::work::{Status, WorkItem};
use crate::store::WorkStore;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_state_transition, start_work_span};

/// Processor tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Items fetched per cycle.
    pub batch_size: usize,
    /// Attempts before a retryable failure becomes terminal.
    pub max_retries: u32,
    /// Sleep after finding the queue empty.
    pub idle_interval_ms: u64,
    /// Sleep after each batch, bounding the downstream call rate.
    pub cooldown_ms: u64,
    /// Sleep after a cycle failed as a whole (store unavailable).
    pub error_backoff_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            idle_interval_ms: 1_000,
            cooldown_ms: 1_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl ProcessorConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// What the store should do with an item after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Processed,
    Retry,
    Failed { error: String, exhausted: bool },
}

/// Apply the retry policy to an attempt's outcome.
pub fn disposition(outcome: &ApprovalOutcome, retry_count: u32, max_retries: u32) -> Disposition {
    match outcome {
        ApprovalOutcome::Approved => Disposition::Processed,
        ApprovalOutcome::Permanent(error) => Disposition::Failed {
            error: error.clone(),
            exhausted: false,
        },
        ApprovalOutcome::Retryable(error) if retry_count + 1 >= max_retries => {
            Disposition::Failed {
                error: error.clone(),
                exhausted: true,
            }
        }
        ApprovalOutcome::Retryable(_) => Disposition::Retry,
    }
}

/// Result of one processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing pending.
    Idle,
    /// This many items were attempted.
    Batch(usize),
}

/// The queue processor loop.
#[derive(Clone)]
pub struct QueueProcessor {
    store: Arc<dyn WorkStore>,
    worker: ApprovalWorker,
    config: ProcessorConfig,
    shutdown: Arc<Notify>,
}

impl QueueProcessor {
    pub fn new(store: Arc<dyn WorkStore>, worker: ApprovalWorker, config: ProcessorConfig) -> Self {
        Self {
            store,
            worker,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the loop to stop. An in-flight batch runs to completion first.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run until shutdown. Never exits on a failed cycle: the error is
    /// logged and the loop backs off before trying again.
    pub async fn run(&self) {
        info!(
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "queue processor started"
        );

        loop {
            let pause = match self.run_once().await {
                Ok(Tick::Idle) => self.config.idle_interval(),
                Ok(Tick::Batch(_)) => self.config.cooldown(),
                Err(e) => {
                    error!(error = %e, "error processing queue");
                    self.config.error_backoff()
                }
            };

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("queue processor shutting down");
                    return;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Fetch one batch and drive every item through the worker.
    pub async fn run_once(&self) -> Result<Tick> {
        // A zero batch size would idle forever.
        let batch = self.store.fetch_batch(self.config.batch_size.max(1)).await?;
        if batch.is_empty() {
            return Ok(Tick::Idle);
        }

        info!(count = batch.len(), "processing batch of join requests");
        let started = Instant::now();
        for item in &batch {
            self.process_item(item).await?;
        }
        metrics::operation_duration_ms().record(
            started.elapsed().as_millis() as f64,
            &[KeyValue::new("operation", "queue.batch")],
        );
        Ok(Tick::Batch(batch.len()))
    }

    async fn process_item(&self, item: &WorkItem) -> Result<()> {
        let work_span = start_work_span(&item.id.0, item.request.group_id);

        async {
            let outcome = self.worker.execute(&item.request).await;
            let next = disposition(&outcome, item.retry_count, self.config.max_retries);

            let (to, result) = match next {
                Disposition::Processed => (
                    Status::Processed,
                    self.store.mark_processed(item.id).await,
                ),
                Disposition::Retry => {
                    info!(
                        id = %item.id,
                        attempt = item.retry_count + 1,
                        "approval failed, will retry"
                    );
                    (Status::Pending, self.store.increment_retry(item.id).await)
                }
                Disposition::Failed { error, exhausted } => {
                    if exhausted {
                        error!(
                            id = %item.id,
                            retries = self.config.max_retries,
                            %error,
                            "approval failed after all retries"
                        );
                    }
                    (Status::Failed, self.store.mark_failed(item.id, &error).await)
                }
            };

            match result {
                Ok(()) => {
                    record_state_transition(&work_span, Status::Pending.as_str(), to.as_str());
                    metrics::work_transitions().add(
                        1,
                        &[
                            KeyValue::new("from", Status::Pending.as_str()),
                            KeyValue::new("to", to.as_str()),
                        ],
                    );
                    Ok(())
                }
                // Someone else already settled this row; nothing to undo.
                Err(e) if e.is_contention() => {
                    warn!(id = %item.id, error = %e, "store rejected update");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(work_span.clone())
        .await
    }
}
