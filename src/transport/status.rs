//! Broadcast progress shown to an administrator as one chat message that
//! is edited in place.

use std::sync::Arc;

use async_trait::async_trait;

use super::TransportError;
use super::telegram::TelegramApi;
use crate::engine::broadcast::ProgressReporter;
use crate::error::Result;
use crate::model::broadcast::{BroadcastProgress, BroadcastSummary};

pub struct StatusMessage {
    api: Arc<TelegramApi>,
    chat_id: i64,
    message_id: i64,
}

impl StatusMessage {
    /// Post the initial status text in `chat_id`.
    pub async fn open(
        api: Arc<TelegramApi>,
        chat_id: i64,
        text: &str,
    ) -> std::result::Result<Self, TransportError> {
        let message_id = api.send_text(chat_id, text).await?;
        Ok(Self {
            api,
            chat_id,
            message_id,
        })
    }

    async fn show(&self, text: String) -> Result<()> {
        self.api
            .edit_text(self.chat_id, self.message_id, &text)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressReporter for StatusMessage {
    async fn progress(&self, progress: &BroadcastProgress) -> Result<()> {
        self.show(progress.to_string()).await
    }

    async fn finished(&self, summary: &BroadcastSummary) -> Result<()> {
        self.show(summary.to_string()).await
    }
}
