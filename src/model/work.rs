//! Work item model.
//!
//! A work item is one queued join request: the group a subject asked to
//! join, the subject itself, and its lifecycle in the approval queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A join request tracked by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier, assigned by the store.
    pub id: WorkId,

    /// The event that created this item. Written once by the intake path.
    pub request: JoinRequest,

    /// When the item was enqueued. Pending items are served oldest first.
    pub enqueued_at: DateTime<Utc>,

    /// Current lifecycle state.
    pub status: Status,

    /// Failed attempts so far.
    pub retry_count: u32,

    /// Error of the attempt that made the item terminal.
    pub last_error: Option<String>,

    /// Set when the item leaves `Pending`.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// A fresh pending item for `request`.
    pub fn pending(request: JoinRequest) -> Self {
        Self {
            id: WorkId::new(),
            request,
            enqueued_at: Utc::now(),
            status: Status::Pending,
            retry_count: 0,
            last_error: None,
            processed_at: None,
        }
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Join request
// ---------------------------------------------------------------------------

/// The four fields the event source delivers for every join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// The group (channel or chat) being joined.
    pub group_id: i64,
    /// The entity asking to join.
    pub subject_id: i64,
    /// Label used in notification text.
    pub subject_name: String,
    /// Label used in notification text.
    pub group_title: String,
}

impl JoinRequest {
    pub fn new(
        group_id: i64,
        subject_id: i64,
        subject_name: impl Into<String>,
        group_title: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            subject_id,
            subject_name: subject_name.into(),
            group_title: group_title.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting for (another) attempt.
    Pending,
    /// Approved. Terminal.
    Processed,
    /// Retries exhausted or permanently rejected. Terminal.
    Failed,
}

impl Status {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, Pending) // retry
                | (Pending, Processed)
                | (Pending, Failed)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Processed | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processed => "processed",
            Status::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "processed" => Ok(Status::Processed),
            "failed" => Ok(Status::Failed),
            other => Err(Error::Other(format!("unknown work status: {other}"))),
        }
    }
}

/// Validate a state transition, returning an error if disallowed.
pub fn validate_transition(from: Status, to: Status) -> crate::error::Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
