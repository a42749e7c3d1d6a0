//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use joinq::engine::{ApprovalWorker, Notices, ProgressReporter};
use joinq::error::{Error, Result};
use joinq::model::broadcast::{BroadcastProgress, BroadcastSummary};
use joinq::model::message::Message;
use joinq::model::work::{JoinRequest, WorkId, WorkItem};
use joinq::ratelimit::RateLimitCoordinator;
use joinq::recipients::{Recipient, RecipientSource};
use joinq::stats::{ApprovalRecord, StatsSink};
use joinq::store::{MemoryStore, WorkStore};
use joinq::transport::{Transport, TransportError};

pub fn request(n: i64) -> JoinRequest {
    JoinRequest::new(-100, n, format!("user-{n}"), "Test Group")
}

pub fn rate_limited(secs: u64) -> TransportError {
    TransportError::RateLimited {
        retry_after: Duration::from_secs(secs),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Transport answering from per-call scripts; unscripted calls succeed.
#[derive(Default)]
pub struct FakeTransport {
    approve_script: Mutex<VecDeque<std::result::Result<(), TransportError>>>,
    send_script: Mutex<HashMap<i64, VecDeque<std::result::Result<(), TransportError>>>>,
    approvals: Mutex<Vec<(i64, i64)>>,
    sends: Mutex<Vec<(i64, Message)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_approvals(
        &self,
        results: impl IntoIterator<Item = std::result::Result<(), TransportError>>,
    ) {
        self.approve_script.lock().unwrap().extend(results);
    }

    pub fn script_sends(
        &self,
        chat_id: i64,
        results: impl IntoIterator<Item = std::result::Result<(), TransportError>>,
    ) {
        self.send_script
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_default()
            .extend(results);
    }

    pub fn approvals(&self) -> Vec<(i64, i64)> {
        self.approvals.lock().unwrap().clone()
    }

    /// Every send attempt, including failed ones.
    pub fn sends(&self) -> Vec<(i64, Message)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn approve(
        &self,
        group_id: i64,
        subject_id: i64,
    ) -> std::result::Result<(), TransportError> {
        self.approvals.lock().unwrap().push((group_id, subject_id));
        self.approve_script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn send(
        &self,
        chat_id: i64,
        message: &Message,
    ) -> std::result::Result<(), TransportError> {
        self.sends.lock().unwrap().push((chat_id, message.clone()));
        self.send_script
            .lock()
            .unwrap()
            .get_mut(&chat_id)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingStats {
    records: Mutex<Vec<ApprovalRecord>>,
    pub fail: AtomicBool,
}

impl RecordingStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<ApprovalRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatsSink for RecordingStats {
    async fn record(&self, record: ApprovalRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("stats down".into()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

pub struct StaticRecipients(pub Vec<Recipient>);

impl StaticRecipients {
    pub fn ids(ids: impl IntoIterator<Item = i64>) -> Arc<Self> {
        Arc::new(Self(ids.into_iter().map(Recipient::new).collect()))
    }
}

#[async_trait]
impl RecipientSource for StaticRecipients {
    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub fetches: AtomicUsize,
    pub mutations: AtomicUsize,
    pub fail_enqueue: AtomicBool,
    /// Number of upcoming fetches that fail.
    pub failing_fetches: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WorkStore for CountingStore {
    async fn enqueue(&self, request: JoinRequest) -> Result<WorkId> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("queue table unreachable".into()));
        }
        self.inner.enqueue(request).await
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<WorkItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(Error::Unavailable("connection refused".into()));
        }
        self.inner.fetch_batch(limit).await
    }

    async fn mark_processed(&self, id: WorkId) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_processed(id).await
    }

    async fn mark_failed(&self, id: WorkId, error: &str) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_failed(id, error).await
    }

    async fn increment_retry(&self, id: WorkId) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.increment_retry(id).await
    }

    async fn get(&self, id: WorkId) -> Result<WorkItem> {
        self.inner.get(id).await
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingReporter {
    progress: Mutex<Vec<BroadcastProgress>>,
    summary: Mutex<Option<BroadcastSummary>>,
    pub fail: bool,
}

impl RecordingReporter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn progress(&self) -> Vec<BroadcastProgress> {
        self.progress.lock().unwrap().clone()
    }

    pub fn summary(&self) -> Option<BroadcastSummary> {
        self.summary.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn progress(&self, progress: &BroadcastProgress) -> Result<()> {
        if self.fail {
            return Err(Error::Transport("message to edit not found".into()));
        }
        self.progress.lock().unwrap().push(progress.clone());
        Ok(())
    }

    async fn finished(&self, summary: &BroadcastSummary) -> Result<()> {
        if self.fail {
            return Err(Error::Transport("message to edit not found".into()));
        }
        *self.summary.lock().unwrap() = Some(summary.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub stats: Arc<RecordingStats>,
    pub limits: Arc<RateLimitCoordinator>,
    pub worker: ApprovalWorker,
}

pub fn harness(notices: Notices) -> Harness {
    let transport = FakeTransport::new();
    let stats = RecordingStats::new();
    let limits = Arc::new(RateLimitCoordinator::new());
    let worker = ApprovalWorker::new(transport.clone(), stats.clone(), limits.clone(), notices);
    Harness {
        transport,
        stats,
        limits,
        worker,
    }
}
