//! Integration tests for the enqueue path and its direct-approval fallback.

mod common;

use std::sync::atomic::Ordering;

use common::{CountingStore, harness, request};
use joinq::engine::{Intake, IntakeOutcome, Notices};
use joinq::model::work::Status;
use joinq::store::WorkStore;
use joinq::transport::TransportError;

#[tokio::test(start_paused = true)]
async fn request_is_queued_without_approving() {
    let h = harness(Notices::silent());
    let store = CountingStore::new();
    let intake = Intake::new(store.clone(), h.worker.clone());

    let outcome = intake.submit(request(1)).await;

    let IntakeOutcome::Queued(id) = outcome else {
        panic!("expected Queued, got {outcome:?}");
    };
    assert_eq!(store.get(id).await.unwrap().status, Status::Pending);
    assert!(h.transport.approvals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enqueue_failure_falls_back_to_direct_approval() {
    let h = harness(Notices::silent());
    let store = CountingStore::new();
    store.fail_enqueue.store(true, Ordering::SeqCst);
    let intake = Intake::new(store.clone(), h.worker.clone());

    let outcome = intake.submit(request(1)).await;

    assert_eq!(outcome, IntakeOutcome::ApprovedDirectly);
    assert_eq!(h.transport.approvals(), vec![(-100, 1)]);
    assert!(store.inner.all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_is_dropped_when_both_paths_fail() {
    let h = harness(Notices::silent());
    h.transport
        .script_approvals([Err(TransportError::Forbidden("CHAT_ADMIN_REQUIRED".into()))]);
    let store = CountingStore::new();
    store.fail_enqueue.store(true, Ordering::SeqCst);
    let intake = Intake::new(store.clone(), h.worker.clone());

    let outcome = intake.submit(request(1)).await;

    match outcome {
        IntakeOutcome::Dropped {
            enqueue_error,
            fallback_error,
        } => {
            assert!(enqueue_error.contains("queue table unreachable"));
            assert!(fallback_error.contains("CHAT_ADMIN_REQUIRED"));
        }
        other => panic!("expected Dropped, got {other:?}"),
    }
    assert_eq!(h.transport.approvals().len(), 1);
}
