//! # joinq
//!
//! Durable, at-least-once approval pipeline for group join requests.
//!
//! Incoming requests are persisted as work items ([`store`], [`db`]) and
//! drained by a single queue processor that approves them through a
//! rate-limited downstream API ([`engine`], [`transport`]), with bounded
//! retries and failure quarantine. A broadcast engine fans one message out
//! to every approved member under the same rate-limit discipline
//! ([`ratelimit`]).

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod ratelimit;
pub mod recipients;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod transport;
