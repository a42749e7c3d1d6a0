//! Metric instrument factories for joinq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"joinq"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for joinq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("joinq")
}

/// Counter: join requests taken in by the intake path.
/// Labels: `result` ("queued" | "fallback" | "dropped").
pub fn work_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("joinq.work.enqueued")
        .with_description("Number of join requests received")
        .build()
}

/// Counter: work item state transitions.
/// Labels: `from`, `to`.
pub fn work_transitions() -> Counter<u64> {
    meter()
        .u64_counter("joinq.work.transitions")
        .with_description("Number of work item state transitions")
        .build()
}

/// Counter: approval worker invocations.
/// Labels: `outcome` ("approved" | "retryable" | "permanent").
pub fn approvals() -> Counter<u64> {
    meter()
        .u64_counter("joinq.approvals")
        .with_description("Number of approval attempts by outcome")
        .build()
}

/// Counter: callers held back by an active cooldown window.
pub fn rate_limit_waits() -> Counter<u64> {
    meter()
        .u64_counter("joinq.ratelimit.waits")
        .with_description("Number of waits on a rate-limit cooldown")
        .build()
}

/// Histogram: time spent waiting on cooldown windows.
pub fn rate_limit_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("joinq.ratelimit.wait_ms")
        .with_description("Time spent waiting on rate-limit cooldowns")
        .with_unit("ms")
        .build()
}

/// Counter: broadcast delivery attempts.
/// Labels: `result` ("sent" | "rate_limited" | "failed").
pub fn broadcast_sends() -> Counter<u64> {
    meter()
        .u64_counter("joinq.broadcast.sends")
        .with_description("Number of broadcast delivery attempts")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("joinq.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
