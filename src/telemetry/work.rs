//! Work and broadcast span helpers.
//!
//! Provides span creation and state-transition recording for work items
//! flowing through the queue processor.

use tracing::Span;
use uuid::Uuid;

/// Start a span for one work item attempt.
///
/// The `work.status` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_work_span(work_id: &Uuid, group_id: i64) -> Span {
    tracing::info_span!(
        "work.execute",
        "work.id" = %work_id,
        "work.group_id" = group_id,
        "work.status" = tracing::field::Empty,
    )
}

/// Record a state transition on the given span.
///
/// Emits a tracing `info` event scoped to the span and stores the new
/// status in its `work.status` field.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("work.status", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}

/// Start a span covering one broadcast run.
pub fn start_broadcast_span(total_recipients: usize) -> Span {
    tracing::info_span!(
        "broadcast.run",
        "broadcast.total" = total_recipients as u64,
    )
}
