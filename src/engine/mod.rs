//! Processing engine: intake, approval worker, queue processor loop and
//! broadcast fan-out.
//!
//! The queue processor and a broadcast run are independent tokio tasks;
//! they share only the rate-limit coordinator and the transport.

pub mod broadcast;
pub mod intake;
pub mod processor;
pub mod worker;

pub use broadcast::{BroadcastConfig, BroadcastEngine, LogProgress, ProgressReporter};
pub use intake::{Intake, IntakeOutcome};
pub use processor::{ProcessorConfig, QueueProcessor};
pub use worker::{ApprovalOutcome, ApprovalWorker, Notices};
