//! Intake: the enqueue path for incoming join requests.
//!
//! A request that cannot be queued is not silently dropped: it is approved
//! directly as a best-effort substitute. Only when both paths fail is the
//! request lost, and that is logged.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{error, info, warn};

use super::worker::{ApprovalOutcome, ApprovalWorker};
use crate::model::work::{JoinRequest, WorkId};
use crate::store::WorkStore;
use crate::telemetry::metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Persisted for the queue processor.
    Queued(WorkId),
    /// Enqueue failed; the fallback approval succeeded.
    ApprovedDirectly,
    /// Enqueue and fallback both failed.
    Dropped { enqueue_error: String, fallback_error: String },
}

pub struct Intake {
    store: Arc<dyn WorkStore>,
    worker: ApprovalWorker,
}

impl Intake {
    pub fn new(store: Arc<dyn WorkStore>, worker: ApprovalWorker) -> Self {
        Self { store, worker }
    }

    pub async fn submit(&self, request: JoinRequest) -> IntakeOutcome {
        let enqueue_error = match self.store.enqueue(request.clone()).await {
            Ok(id) => {
                info!(
                    %id,
                    subject_id = request.subject_id,
                    subject = %request.subject_name,
                    group = %request.group_title,
                    "join request queued"
                );
                metrics::work_enqueued().add(1, &[KeyValue::new("result", "queued")]);
                return IntakeOutcome::Queued(id);
            }
            Err(e) => e,
        };

        warn!(
            error = %enqueue_error,
            subject_id = request.subject_id,
            "failed to queue join request, approving directly"
        );
        match self.worker.execute(&request).await {
            ApprovalOutcome::Approved => {
                metrics::work_enqueued().add(1, &[KeyValue::new("result", "fallback")]);
                IntakeOutcome::ApprovedDirectly
            }
            ApprovalOutcome::Retryable(fallback_error)
            | ApprovalOutcome::Permanent(fallback_error) => {
                error!(
                    subject_id = request.subject_id,
                    group_id = request.group_id,
                    %fallback_error,
                    "fallback approval failed, join request dropped"
                );
                metrics::work_enqueued().add(1, &[KeyValue::new("result", "dropped")]);
                IntakeOutcome::Dropped {
                    enqueue_error: enqueue_error.to_string(),
                    fallback_error,
                }
            }
        }
    }
}
