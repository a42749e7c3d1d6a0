//! Integration tests for telemetry initialization and span helpers.

use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be installed once per process; another
    // test may already have done so, in which case Err is acceptable.
    let config = joinq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "joinq-test".to_string(),
        default_filter: "info".to_string(),
    };
    if let Ok(guard) = joinq::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn work_span_creates_and_records_transition() {
    let id = Uuid::new_v4();
    let span = joinq::telemetry::work::start_work_span(&id, -100);
    joinq::telemetry::work::record_state_transition(&span, "pending", "processed");
}

#[test]
fn broadcast_span_creates() {
    let span = joinq::telemetry::work::start_broadcast_span(250);
    let _entered = span.enter();
}

#[test]
fn metric_instruments_accept_records_without_provider() {
    use opentelemetry::KeyValue;

    joinq::telemetry::metrics::work_enqueued().add(1, &[KeyValue::new("result", "queued")]);
    joinq::telemetry::metrics::rate_limit_wait_ms().record(12.0, &[]);
}
