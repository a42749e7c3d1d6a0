//! Join-request event source: long-polls the Bot API for
//! `chat_join_request` updates and hands each one to the intake path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::TransportError;
use super::telegram::TelegramApi;
use crate::engine::intake::Intake;

/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;
/// Pause after a failed poll.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct JoinRequestFeed {
    api: Arc<TelegramApi>,
    intake: Arc<Intake>,
    shutdown: Arc<Notify>,
}

impl JoinRequestFeed {
    pub fn new(api: Arc<TelegramApi>, intake: Arc<Intake>) -> Self {
        Self {
            api,
            intake,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Poll until shutdown.
    pub async fn run(&self) {
        info!("join request feed started");
        let mut offset = 0;

        loop {
            let polled = tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("join request feed shutting down");
                    return;
                }
                polled = self.api.get_updates(offset, POLL_TIMEOUT_SECS) => polled,
            };

            let pause = match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(request) = update.chat_join_request {
                            debug!(update_id = update.update_id, "join request received");
                            let outcome = self.intake.submit(request.into()).await;
                            debug!(?outcome, "join request handled");
                        }
                    }
                    None
                }
                Err(TransportError::RateLimited { retry_after }) => Some(retry_after),
                Err(e) => {
                    warn!(error = %e, "polling for updates failed");
                    Some(POLL_ERROR_BACKOFF)
                }
            };

            if let Some(pause) = pause {
                tokio::time::sleep(pause).await;
            }
        }
    }
}
