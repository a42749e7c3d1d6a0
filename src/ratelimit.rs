//! Rate-limit coordination.
//!
//! The downstream API can answer any call with "retry after N seconds",
//! for the chat a call concerns. The coordinator remembers those cooldown
//! windows and suspends callers until they elapse. Windows are independent
//! per target: a cooldown on one chat never delays work for another.
//!
//! One coordinator is created per process and handed to every component that
//! talks to the downstream API.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::telemetry::metrics;

/// What a cooldown window applies to: calls concerning one chat (a group
/// being approved into, or a recipient being messaged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateTarget {
    Chat(i64),
}

/// Per-target cooldown windows (`resume_at` instants).
#[derive(Debug, Default)]
pub struct RateLimitCoordinator {
    windows: Mutex<HashMap<RateTarget, Instant>>,
}

impl RateLimitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<RateTarget, Instant>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a rate-limit signal: no call for `target` until `now + wait`.
    ///
    /// A shorter signal never shortens a window that is already open.
    pub fn record(&self, target: RateTarget, wait: Duration) {
        let resume_at = Instant::now() + wait;
        let mut windows = self.windows();
        let slot = windows.entry(target).or_insert(resume_at);
        if *slot < resume_at {
            *slot = resume_at;
        }
        debug!(?target, wait_ms = wait.as_millis() as u64, "cooldown recorded");
    }

    /// When calls for `target` may resume, if its cooldown is still active.
    pub fn resume_at(&self, target: RateTarget) -> Option<Instant> {
        let now = Instant::now();
        let mut windows = self.windows();
        windows.retain(|_, resume_at| *resume_at > now);
        windows.get(&target).copied()
    }

    /// Suspend until no cooldown applies to `target`. Returns immediately
    /// when none is active. Returns how long the caller was held.
    pub async fn wait(&self, target: RateTarget) -> Duration {
        let start = Instant::now();
        // A window may be extended while we sleep, so re-check after waking.
        while let Some(resume_at) = self.resume_at(target) {
            tokio::time::sleep_until(resume_at).await;
        }

        let waited = start.elapsed();
        if !waited.is_zero() {
            metrics::rate_limit_waits().add(1, &[]);
            metrics::rate_limit_wait_ms().record(waited.as_millis() as f64, &[]);
        }
        waited
    }
}
