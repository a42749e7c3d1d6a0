//! Downstream approval/notification transport.
//!
//! The engine only sees the [`Transport`] trait and the tagged
//! [`TransportError`] it returns; callers switch on the error variant to
//! decide between backoff, permanent failure and retry.

pub mod feed;
pub mod status;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::message::Message;

pub use feed::JoinRequestFeed;
pub use status::StatusMessage;
pub use telegram::TelegramApi;

/// Classified failure of a downstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Authoritative "retry after" signal.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The subject is deactivated, invalid or otherwise gone. Retrying will
    /// never succeed.
    #[error("subject unreachable: {0}")]
    SubjectUnreachable(String),

    /// The bot lacks the privilege required in the target chat.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Stable label for logs and metric attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::RateLimited { .. } => "rate_limited",
            TransportError::SubjectUnreachable(_) => "subject_unreachable",
            TransportError::Forbidden(_) => "forbidden",
            TransportError::Other(_) => "other",
        }
    }
}

impl From<TransportError> for crate::error::Error {
    fn from(e: TransportError) -> Self {
        crate::error::Error::Transport(e.to_string())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Approve `subject_id`'s pending request to join `group_id`.
    async fn approve(&self, group_id: i64, subject_id: i64) -> Result<(), TransportError>;

    /// Deliver `message` to `chat_id`.
    async fn send(&self, chat_id: i64, message: &Message) -> Result<(), TransportError>;
}
