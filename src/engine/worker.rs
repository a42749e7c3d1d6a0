//! Approval worker: runs one join request to approval or a classified
//! failure.
//!
//! Rate limiting is handled inline: a "retry after" on the approval call is
//! waited out once and the call retried exactly once. Whatever that single
//! retry returns is the result of the invocation. The outer retry budget
//! (spacing attempts across batches) belongs to the queue processor and is
//! independent of this one.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::model::message::Message;
use crate::model::work::JoinRequest;
use crate::ratelimit::{RateLimitCoordinator, RateTarget};
use crate::stats::{ApprovalRecord, StatsSink};
use crate::telemetry::metrics;
use crate::transport::{Transport, TransportError};

const DEFAULT_CONFIRMATION: &str =
    "<b>Hello {name}!\nYour request to join {group} has been approved.</b>";

/// Messages sent to a subject after approval. `{name}` and `{group}` in
/// the confirmation are replaced with the request's display labels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Notices {
    pub confirmation: Option<String>,
    pub promo_text: Option<String>,
    pub promo_photo: Option<String>,
    pub promo_caption: Option<String>,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            confirmation: Some(DEFAULT_CONFIRMATION.to_string()),
            promo_text: None,
            promo_photo: None,
            promo_caption: None,
        }
    }
}

impl Notices {
    /// Send nothing after approval.
    pub fn silent() -> Self {
        Self {
            confirmation: None,
            ..Self::default()
        }
    }

    /// Promotional message, photo preferred over text.
    pub fn promo(&self) -> Option<Message> {
        match (&self.promo_photo, &self.promo_text) {
            (Some(url), _) => Some(Message::Photo {
                url: url.clone(),
                caption: self.promo_caption.clone().unwrap_or_default(),
            }),
            (None, Some(text)) => Some(Message::text(text.clone())),
            (None, None) => None,
        }
    }

    pub fn confirmation(&self, request: &JoinRequest) -> Option<Message> {
        self.confirmation.as_ref().map(|template| {
            Message::text(
                template
                    .replace("{name}", &request.subject_name)
                    .replace("{group}", &request.group_title),
            )
        })
    }
}

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    /// May succeed on a later attempt.
    Retryable(String),
    /// Will never succeed (subject gone, missing privilege).
    Permanent(String),
}

impl ApprovalOutcome {
    fn label(&self) -> &'static str {
        match self {
            ApprovalOutcome::Approved => "approved",
            ApprovalOutcome::Retryable(_) => "retryable",
            ApprovalOutcome::Permanent(_) => "permanent",
        }
    }
}

/// Executes approvals against the transport. Cheap to clone.
#[derive(Clone)]
pub struct ApprovalWorker {
    transport: Arc<dyn Transport>,
    stats: Arc<dyn StatsSink>,
    limits: Arc<RateLimitCoordinator>,
    notices: Arc<Notices>,
}

impl ApprovalWorker {
    pub fn new(
        transport: Arc<dyn Transport>,
        stats: Arc<dyn StatsSink>,
        limits: Arc<RateLimitCoordinator>,
        notices: Notices,
    ) -> Self {
        Self {
            transport,
            stats,
            limits,
            notices: Arc::new(notices),
        }
    }

    /// Approve `request`, notify the subject and record statistics.
    pub async fn execute(&self, request: &JoinRequest) -> ApprovalOutcome {
        let target = RateTarget::Chat(request.group_id);
        self.limits.wait(target).await;

        let result = match self.approve(request).await {
            Err(TransportError::RateLimited { retry_after }) => {
                warn!(
                    group_id = request.group_id,
                    retry_after_s = retry_after.as_secs(),
                    "rate limited, retrying once after cooldown"
                );
                self.limits.record(target, retry_after);
                self.limits.wait(target).await;

                let retried = self.approve(request).await;
                if let Err(TransportError::RateLimited { retry_after }) = &retried {
                    // Leave the window for the next caller; no second wait here.
                    self.limits.record(target, *retry_after);
                }
                retried
            }
            other => other,
        };

        let outcome = match result {
            Ok(()) => {
                info!(
                    subject_id = request.subject_id,
                    subject = %request.subject_name,
                    group = %request.group_title,
                    "join request approved"
                );
                self.after_approval(request).await;
                ApprovalOutcome::Approved
            }
            Err(e) => {
                let outcome = match e {
                    TransportError::SubjectUnreachable(_) => {
                        warn!(subject_id = request.subject_id, error = %e, "subject unreachable");
                        ApprovalOutcome::Permanent(e.to_string())
                    }
                    TransportError::Forbidden(_) => {
                        error!(
                            group_id = request.group_id,
                            error = %e,
                            "missing privilege to approve"
                        );
                        ApprovalOutcome::Permanent(e.to_string())
                    }
                    TransportError::RateLimited { .. } | TransportError::Other(_) => {
                        error!(subject_id = request.subject_id, error = %e, "approval failed");
                        ApprovalOutcome::Retryable(e.to_string())
                    }
                };
                self.record(ApprovalRecord::rejected(
                    request.group_id,
                    request.subject_id,
                    &request.subject_name,
                    e.to_string(),
                ))
                .await;
                outcome
            }
        };

        metrics::approvals().add(1, &[KeyValue::new("outcome", outcome.label())]);
        outcome
    }

    async fn approve(&self, request: &JoinRequest) -> Result<(), TransportError> {
        self.transport
            .approve(request.group_id, request.subject_id)
            .await
    }

    /// Best effort. Approval already happened and is never rolled back.
    async fn after_approval(&self, request: &JoinRequest) {
        if let Some(promo) = self.notices.promo() {
            self.notify(request.subject_id, &promo).await;
        }
        if let Some(confirmation) = self.notices.confirmation(request) {
            self.notify(request.subject_id, &confirmation).await;
        }
        self.record(ApprovalRecord::approved(
            request.group_id,
            request.subject_id,
            &request.subject_name,
        ))
        .await;
    }

    async fn notify(&self, subject_id: i64, message: &Message) {
        let target = RateTarget::Chat(subject_id);
        self.limits.wait(target).await;
        match self.transport.send(subject_id, message).await {
            Ok(()) => {}
            Err(TransportError::RateLimited { retry_after }) => {
                self.limits.record(target, retry_after);
                warn!(
                    subject_id,
                    retry_after_s = retry_after.as_secs(),
                    "notification skipped, rate limited"
                );
            }
            Err(e) => warn!(subject_id, kind = e.kind(), error = %e, "notification failed"),
        }
    }

    async fn record(&self, record: ApprovalRecord) {
        if let Err(e) = self.stats.record(record).await {
            warn!(error = %e, "failed to record statistics");
        }
    }
}
