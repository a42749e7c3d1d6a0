//! Broadcast run bookkeeping.
//!
//! A [`BroadcastRun`] lives for exactly one broadcast invocation and is owned
//! by the engine driving it. Only snapshots ([`BroadcastProgress`],
//! [`BroadcastSummary`]) leave the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// In-memory progress record for one broadcast.
#[derive(Debug)]
pub struct BroadcastRun {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    clock: Instant,
}

impl BroadcastRun {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            sent: 0,
            failed: 0,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub fn processed(&self) -> usize {
        self.sent + self.failed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    /// Instantaneous throughput snapshot.
    pub fn progress(&self) -> BroadcastProgress {
        BroadcastProgress {
            processed: self.processed(),
            total: self.total,
            successful: self.sent,
            failed: self.failed,
            rate_per_sec: per_second(self.processed(), self.elapsed_seconds()),
        }
    }

    /// Consume the run into its final counters.
    pub fn finish(self) -> BroadcastSummary {
        let elapsed_seconds = self.elapsed_seconds();
        BroadcastSummary {
            total: self.total,
            successful: self.sent,
            failed: self.failed,
            elapsed_seconds,
            average_rate_per_sec: per_second(self.total, elapsed_seconds),
        }
    }
}

fn per_second(count: usize, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds > 0.0 {
        count as f64 / elapsed_seconds
    } else {
        0.0
    }
}

/// Periodic snapshot emitted while a broadcast is running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastProgress {
    pub processed: usize,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub rate_per_sec: f64,
}

impl std::fmt::Display for BroadcastProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Broadcasting...\nProcessed: {}/{}\nSuccessful: {}\n\
             Failed: {}\nSpeed: {:.1} recipients/sec",
            self.processed, self.total, self.successful, self.failed, self.rate_per_sec
        )
    }
}

/// Aggregate counters returned when a broadcast completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub average_rate_per_sec: f64,
}

impl std::fmt::Display for BroadcastSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Broadcast completed!\n\nTotal recipients: {}\nSuccessful: {}\n\
             Failed: {}\nTime taken: {:.1} seconds\n\
             Average speed: {:.1} recipients/sec",
            self.total,
            self.successful,
            self.failed,
            self.elapsed_seconds,
            self.average_rate_per_sec
        )
    }
}
