//! Integration tests for the broadcast engine.

mod common;

use std::sync::Arc;

use common::{FakeTransport, RecordingReporter, StaticRecipients, rate_limited};
use joinq::engine::{BroadcastConfig, BroadcastEngine};
use joinq::model::message::Message;
use joinq::ratelimit::RateLimitCoordinator;
use joinq::transport::TransportError;

fn engine(transport: Arc<FakeTransport>, recipients: Arc<StaticRecipients>) -> BroadcastEngine {
    BroadcastEngine::new(
        transport,
        recipients,
        Arc::new(RateLimitCoordinator::new()),
        BroadcastConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn counts_successes_and_failures() {
    let transport = FakeTransport::new();
    transport.script_sends(37, [Err(TransportError::SubjectUnreachable("chat not found".into()))]);
    transport.script_sends(52, [Err(TransportError::Other("400: Bad Request".into()))]);
    let reporter = RecordingReporter::default();

    let summary = engine(transport.clone(), StaticRecipients::ids(1..=100))
        .run(&Message::text("hello"), &reporter)
        .await
        .unwrap();

    assert_eq!(summary.total, 100);
    assert_eq!(summary.successful, 98);
    assert_eq!(summary.failed, 2);
    assert_eq!(transport.sends().len(), 100);

    let progress = reporter.progress();
    assert_eq!(progress.len(), 10);
    assert_eq!(progress[0].processed, 10);
    assert_eq!(progress[9].processed, 100);
    assert_eq!(progress[9].successful + progress[9].failed, 100);
    assert_eq!(reporter.summary(), Some(summary));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_recipient_is_retried_after_wait() {
    let transport = FakeTransport::new();
    transport.script_sends(1, [Err(rate_limited(2)), Ok(())]);
    let reporter = RecordingReporter::default();

    let summary = engine(transport.clone(), StaticRecipients::ids([1]))
        .run(&Message::text("hello"), &reporter)
        .await
        .unwrap();

    assert_eq!((summary.total, summary.successful, summary.failed), (1, 1, 0));
    assert!(summary.elapsed_seconds >= 2.0);
    assert_eq!(transport.sends().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn recipients_are_served_in_order() {
    let transport = FakeTransport::new();
    let ids: Vec<i64> = (1..=45).collect();

    engine(transport.clone(), StaticRecipients::ids(ids.clone()))
        .run(&Message::copy_of(-500, 42), &RecordingReporter::default())
        .await
        .unwrap();

    let sent: Vec<i64> = transport.sends().iter().map(|(chat, _)| *chat).collect();
    assert_eq!(sent, ids);
    assert!(
        transport
            .sends()
            .iter()
            .all(|(_, m)| *m == Message::copy_of(-500, 42))
    );
}

#[tokio::test(start_paused = true)]
async fn failing_reporter_does_not_stop_delivery() {
    let transport = FakeTransport::new();

    let summary = engine(transport.clone(), StaticRecipients::ids(1..=25))
        .run(&Message::text("hello"), &RecordingReporter::failing())
        .await
        .unwrap();

    assert_eq!(summary.successful, 25);
    assert_eq!(transport.sends().len(), 25);
}

#[tokio::test(start_paused = true)]
async fn empty_recipient_list_completes_with_zeros() {
    let transport = FakeTransport::new();
    let reporter = RecordingReporter::default();

    let summary = engine(transport.clone(), StaticRecipients::ids(Vec::new()))
        .run(&Message::text("hello"), &reporter)
        .await
        .unwrap();

    assert_eq!((summary.total, summary.successful, summary.failed), (0, 0, 0));
    assert_eq!(summary.average_rate_per_sec, 0.0);
    assert!(reporter.progress().is_empty());
    assert!(transport.sends().is_empty());
}

#[test]
fn summary_text_lists_counters() {
    let run = joinq::model::broadcast::BroadcastRun::start(3);
    let text = run.finish().to_string();
    assert!(text.contains("Total recipients: 3"));
    assert!(text.contains("Successful: 0"));
}
