//! Approval statistics sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One approval attempt outcome, as recorded for analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub group_id: i64,
    pub subject_id: i64,
    /// Carried so an approved subject can be remembered as a broadcast
    /// recipient.
    pub subject_name: String,
    pub approved: bool,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ApprovalRecord {
    pub fn approved(group_id: i64, subject_id: i64, subject_name: impl Into<String>) -> Self {
        Self {
            group_id,
            subject_id,
            subject_name: subject_name.into(),
            approved: true,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn rejected(
        group_id: i64,
        subject_id: i64,
        subject_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            subject_id,
            subject_name: subject_name.into(),
            approved: false,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Fire-and-forget statistics destination. Callers log failures and move on.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn record(&self, record: ApprovalRecord) -> Result<()>;
}
