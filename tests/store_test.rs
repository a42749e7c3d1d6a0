//! Integration tests for the in-memory work store.

mod common;

use common::request;
use joinq::error::Error;
use joinq::model::work::{Status, WorkId};
use joinq::store::{MemoryStore, WorkStore};

#[tokio::test]
async fn enqueue_creates_pending_item() {
    let store = MemoryStore::new();

    let id = store.enqueue(request(1)).await.unwrap();

    let item = store.get(id).await.unwrap();
    assert_eq!(item.status, Status::Pending);
    assert_eq!(item.retry_count, 0);
    assert_eq!(item.request, request(1));
    assert!(item.last_error.is_none());
    assert!(item.processed_at.is_none());
}

#[tokio::test]
async fn fetch_batch_is_oldest_first_and_pending_only() {
    let store = MemoryStore::new();
    let ids: Vec<WorkId> = {
        let mut ids = Vec::new();
        for n in 0..4 {
            ids.push(store.enqueue(request(n)).await.unwrap());
        }
        ids
    };
    store.mark_processed(ids[1]).await.unwrap();

    let batch = store.fetch_batch(10).await.unwrap();
    let fetched: Vec<WorkId> = batch.iter().map(|item| item.id).collect();
    assert_eq!(fetched, vec![ids[0], ids[2], ids[3]]);

    let limited = store.fetch_batch(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, ids[0]);
}

#[tokio::test]
async fn fetch_does_not_claim() {
    let store = MemoryStore::new();
    store.enqueue(request(1)).await.unwrap();

    assert_eq!(store.fetch_batch(10).await.unwrap().len(), 1);
    assert_eq!(store.fetch_batch(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_store_yields_empty_batch() {
    let store = MemoryStore::new();
    assert!(store.fetch_batch(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn increment_retry_keeps_item_pending() {
    let store = MemoryStore::new();
    let id = store.enqueue(request(1)).await.unwrap();

    store.increment_retry(id).await.unwrap();
    store.increment_retry(id).await.unwrap();

    let item = store.get(id).await.unwrap();
    assert_eq!(item.status, Status::Pending);
    assert_eq!(item.retry_count, 2);
}

#[tokio::test]
async fn mark_failed_records_error_and_counts_attempt() {
    let store = MemoryStore::new();
    let id = store.enqueue(request(1)).await.unwrap();
    store.increment_retry(id).await.unwrap();

    store.mark_failed(id, "USER_DEACTIVATED").await.unwrap();

    let item = store.get(id).await.unwrap();
    assert_eq!(item.status, Status::Failed);
    assert_eq!(item.retry_count, 2);
    assert_eq!(item.last_error.as_deref(), Some("USER_DEACTIVATED"));
    assert!(item.processed_at.is_some());
    assert!(store.fetch_batch(10).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Terminal states
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeating_terminal_update_is_noop() {
    let store = MemoryStore::new();
    let id = store.enqueue(request(1)).await.unwrap();

    store.mark_processed(id).await.unwrap();
    let first = store.get(id).await.unwrap();
    store.mark_processed(id).await.unwrap();
    let second = store.get(id).await.unwrap();

    assert_eq!(first.processed_at, second.processed_at);

    let failed = store.enqueue(request(2)).await.unwrap();
    store.mark_failed(failed, "first").await.unwrap();
    store.mark_failed(failed, "second").await.unwrap();
    let item = store.get(failed).await.unwrap();
    assert_eq!(item.retry_count, 1);
    assert_eq!(item.last_error.as_deref(), Some("first"));
}

#[tokio::test]
async fn terminal_item_rejects_other_mutations() {
    let store = MemoryStore::new();
    let id = store.enqueue(request(1)).await.unwrap();
    store.mark_processed(id).await.unwrap();

    let err = store.mark_failed(id, "late").await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert!(err.is_contention());

    let err = store.increment_retry(id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let item = store.get(id).await.unwrap();
    assert_eq!(item.status, Status::Processed);
    assert_eq!(item.retry_count, 0);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let store = MemoryStore::new();

    let err = store.mark_processed(WorkId::new()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.is_contention());
    assert!(matches!(
        store.get(WorkId::new()).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn all_lists_items_in_enqueue_order() {
    let store = MemoryStore::new();
    for n in 0..3 {
        store.enqueue(request(n)).await.unwrap();
    }

    let subjects: Vec<i64> = store
        .all()
        .iter()
        .map(|item| item.request.subject_id)
        .collect();
    assert_eq!(subjects, vec![0, 1, 2]);
}
