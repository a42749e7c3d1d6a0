//! Broadcast fan-out: one message to every recipient in a snapshot.
//!
//! Sends are sequential. Recipients are walked in fixed-size chunks only to
//! bound iteration, not for parallelism. A rate-limit signal for a recipient
//! is authoritative, so that recipient is retried after the signaled wait
//! until it either succeeds or fails for another reason.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::Deserialize;
use tracing::{Instrument, debug, info, warn};

use crate::error::Result;
use crate::model::broadcast::{BroadcastProgress, BroadcastRun, BroadcastSummary};
use crate::model::message::Message;
use crate::ratelimit::{RateLimitCoordinator, RateTarget};
use crate::recipients::RecipientSource;
use crate::telemetry::metrics;
use crate::telemetry::work::start_broadcast_span;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub chunk_size: usize,
    /// Emit a progress snapshot every this many processed recipients.
    pub progress_every: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            progress_every: 10,
        }
    }
}

/// Receives progress snapshots and the final summary of a broadcast.
///
/// Reporting is fire-and-forget: an error returned here is logged by the
/// engine and never affects delivery.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn progress(&self, progress: &BroadcastProgress) -> Result<()>;
    async fn finished(&self, summary: &BroadcastSummary) -> Result<()>;
}

/// Reports through the tracing log only.
pub struct LogProgress;

#[async_trait]
impl ProgressReporter for LogProgress {
    async fn progress(&self, p: &BroadcastProgress) -> Result<()> {
        info!(
            processed = p.processed,
            total = p.total,
            successful = p.successful,
            failed = p.failed,
            rate_per_sec = p.rate_per_sec,
            "broadcast progress"
        );
        Ok(())
    }

    async fn finished(&self, s: &BroadcastSummary) -> Result<()> {
        info!(
            total = s.total,
            successful = s.successful,
            failed = s.failed,
            elapsed_s = s.elapsed_seconds,
            "broadcast finished"
        );
        Ok(())
    }
}

pub struct BroadcastEngine {
    transport: Arc<dyn Transport>,
    recipients: Arc<dyn RecipientSource>,
    limits: Arc<RateLimitCoordinator>,
    config: BroadcastConfig,
}

impl BroadcastEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        recipients: Arc<dyn RecipientSource>,
        limits: Arc<RateLimitCoordinator>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            transport,
            recipients,
            limits,
            config,
        }
    }

    /// Send `message` to every current recipient.
    ///
    /// # Errors
    ///
    /// Only if the recipient snapshot cannot be read. Individual delivery
    /// failures are counted, not returned.
    pub async fn run(
        &self,
        message: &Message,
        reporter: &dyn ProgressReporter,
    ) -> Result<BroadcastSummary> {
        let recipients = self.recipients.list_recipients().await?;
        let span = start_broadcast_span(recipients.len());

        async {
            let mut run = BroadcastRun::start(recipients.len());
            let every = self.config.progress_every.max(1);
            info!(total = run.total, "starting broadcast");

            for chunk in recipients.chunks(self.config.chunk_size.max(1)) {
                for recipient in chunk {
                    if self.deliver(recipient.id, message).await {
                        run.sent += 1;
                    } else {
                        run.failed += 1;
                    }

                    if run.processed() % every == 0 {
                        if let Err(e) = reporter.progress(&run.progress()).await {
                            debug!(error = %e, "progress update dropped");
                        }
                    }
                }
            }

            let summary = run.finish();
            info!(
                total = summary.total,
                successful = summary.successful,
                failed = summary.failed,
                elapsed_s = summary.elapsed_seconds,
                "broadcast completed"
            );
            if let Err(e) = reporter.finished(&summary).await {
                warn!(error = %e, "final broadcast report failed");
            }
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Deliver to one recipient. `true` on success.
    async fn deliver(&self, recipient: i64, message: &Message) -> bool {
        let target = RateTarget::Chat(recipient);
        loop {
            self.limits.wait(target).await;
            match self.transport.send(recipient, message).await {
                Ok(()) => {
                    metrics::broadcast_sends().add(1, &[KeyValue::new("result", "sent")]);
                    return true;
                }
                Err(TransportError::RateLimited { retry_after }) => {
                    debug!(
                        recipient,
                        retry_after_s = retry_after.as_secs(),
                        "rate limited, retrying recipient"
                    );
                    metrics::broadcast_sends().add(1, &[KeyValue::new("result", "rate_limited")]);
                    self.limits.record(target, retry_after);
                }
                Err(e) => {
                    warn!(recipient, kind = e.kind(), error = %e, "broadcast delivery failed");
                    metrics::broadcast_sends().add(1, &[KeyValue::new("result", "failed")]);
                    return false;
                }
            }
        }
    }
}
