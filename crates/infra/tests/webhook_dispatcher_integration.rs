//! Integration tests for WebhookDispatcher against a real HTTP receiver
//!
//! **Coverage:**
//! - Disabled mode: no URL → success without any request
//! - Retry: transient 503s recovered, permanent 500s exhausted
//! - Batch: grouping, inter-batch delay, per-item isolation, error tagging
//! - Wire format: headers and envelope body
//! - Circuit breaker guarded sends, connection test, timeouts, shared stats
//!
//! **Infrastructure:**
//! - WireMock HTTP server standing in for the webhook receiver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hookrelay_common::resilience::{CircuitBreaker, CircuitBreakerConfig, MockClock};
use hookrelay_domain::{BatchOptions, BookingEventPayload, WebhookConfig};
use hookrelay_infra::webhooks::{NetworkOnly, ServerErrors, StatsRegistry, WebhookDispatcher};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn config_for(server: &MockServer, retry_attempts: u32) -> WebhookConfig {
    WebhookConfig {
        url: Some(format!("{}/hooks", server.uri())),
        secret: Some("s3cret".into()),
        retry_attempts,
        retry_base_delay_ms: 10,
        timeout_ms: 2_000,
        environment: "test".into(),
        ..WebhookConfig::default()
    }
}

fn dispatcher(config: WebhookConfig) -> WebhookDispatcher {
    WebhookDispatcher::new(config).expect("dispatcher")
}

fn booking(id: &str) -> BookingEventPayload {
    BookingEventPayload {
        id: id.to_string(),
        ..BookingEventPayload::new("booking.created", format!("Booking {id}"))
    }
}

/// Responds with `statuses[n]` to the n-th request, then with the last one.
fn sequenced(statuses: Vec<u16>) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    let calls = Arc::new(AtomicUsize::new(0));
    move |_req: &Request| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let status = statuses.get(n).or(statuses.last()).copied().unwrap_or(200);
        ResponseTemplate::new(status)
    }
}

// ============================================================================
// Disabled mode
// ============================================================================

#[tokio::test]
async fn test_unset_url_succeeds_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let config = WebhookConfig { url: None, ..config_for(&server, 3) };
    let dispatcher = dispatcher(config);

    let result = dispatcher.send(&booking("evt-1"), None).await;

    assert!(result.success);
    assert!(result.error.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(dispatcher.stats().total_sent, 0);
}

#[tokio::test]
async fn test_disabled_flag_skips_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let config = WebhookConfig { enabled: false, ..config_for(&server, 3) };
    let result = dispatcher(config).send_with_retry(&booking("evt-1"), None).await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(sequenced(vec![503, 503, 200]))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(config_for(&server, 3));
    let result = dispatcher.send_with_retry(&booking("evt-1"), None).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.attempts, 3);

    let stats = dispatcher.stats();
    assert_eq!(stats.total_sent, 3);
    assert_eq!(stats.successful_sent, 1);
    assert_eq!(stats.failed_sent, 2);
    assert_eq!(stats.last_error.as_deref(), Some("HTTP 503: Service Unavailable"));
}

#[tokio::test]
async fn test_retry_exhaustion_reports_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let result = dispatcher(config_for(&server, 2)).send_with_retry(&booking("evt-1"), None).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error.as_deref(), Some("HTTP 500: Internal Server Error"));
}

#[tokio::test]
async fn test_retry_ids_are_stable_across_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sequenced(vec![502, 200]))
        .expect(2)
        .mount(&server)
        .await;

    dispatcher(config_for(&server, 3)).send_with_retry(&booking("evt-stable"), None).await;

    let requests = server.received_requests().await.unwrap();
    for request in &requests {
        assert_eq!(request.headers["x-webhook-event-id"], "evt-stable");
    }
}

#[tokio::test]
async fn test_network_only_policy_does_not_retry_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = dispatcher(config_for(&server, 5))
        .send_with_policy(&booking("evt-1"), None, NetworkOnly)
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn test_server_errors_policy_stops_on_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sequenced(vec![503, 404]))
        .expect(2)
        .mount(&server)
        .await;

    let result = dispatcher(config_for(&server, 5))
        .send_with_policy(&booking("evt-1"), None, ServerErrors)
        .await;

    assert_eq!(result.attempts, 2);
    assert_eq!(result.error.as_deref(), Some("HTTP 404: Not Found"));
}

#[tokio::test]
async fn test_timeout_is_reported_and_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let config = WebhookConfig { timeout_ms: 100, ..config_for(&server, 2) };
    let result = dispatcher(config).send_with_retry(&booking("evt-slow"), None).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error.as_deref(), Some("request timed out after 100ms"));
}

// ============================================================================
// Wire format
// ============================================================================

#[tokio::test]
async fn test_request_headers_and_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", "HookRelay-Webhook/1.0"))
        .and(header("x-webhook-secret", "s3cret"))
        .and(header("x-webhook-event-type", "booking.created"))
        .respond_with(ResponseTemplate::new(200).set_body_string("thanks"))
        .expect(1)
        .mount(&server)
        .await;

    let event = booking("evt-wire").with_metadata("bookingId", "bk_42");
    let context = json!({"requestId": "req-7"});
    let result = dispatcher(config_for(&server, 1)).send(&event, Some(&context)).await;
    assert!(result.success, "unexpected failure: {:?}", result.error);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["eventId"], "evt-wire");
    assert_eq!(body["eventType"], "booking.created");
    assert!(body["eventTimestamp"].is_string());
    assert_eq!(body["payload"]["metadata"]["bookingId"], "bk_42");
    assert_eq!(body["systemContext"]["environment"], "test");
    assert_eq!(body["systemContext"]["requestMetadata"]["requestId"], "req-7");
}

#[tokio::test]
async fn test_secret_header_omitted_when_unset() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

    let config = WebhookConfig { secret: None, ..config_for(&server, 1) };
    let result = dispatcher(config).send(&booking("evt-1"), None).await;

    assert!(result.success);
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-webhook-secret").is_none());
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_batch_isolates_failures_and_tags_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-webhook-event-id", "evt-3"))
        .respond_with(ResponseTemplate::new(400))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let events: Vec<_> = (1..=5).map(|i| booking(&format!("evt-{i}"))).collect();
    let options = BatchOptions { batch_size: 2, delay_between_batches: Duration::from_millis(10) };

    let summary = dispatcher(config_for(&server, 1)).batch_send(&events, &options).await;

    assert_eq!(summary.total_events, 5);
    assert_eq!(summary.successful_events, 4);
    assert_eq!(summary.failed_events, 1);
    assert_eq!(summary.errors, vec!["evt-3: HTTP 400: Bad Request".to_string()]);
}

#[tokio::test]
async fn test_batch_runs_groups_concurrently_and_sequentially() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .expect(5)
        .mount(&server)
        .await;

    let events: Vec<_> = (1..=5).map(|i| booking(&format!("evt-{i}"))).collect();
    let options = BatchOptions { batch_size: 2, delay_between_batches: Duration::ZERO };

    let started = Instant::now();
    let summary = dispatcher(config_for(&server, 1)).batch_send(&events, &options).await;
    let elapsed = started.elapsed();

    // Groups [2, 2, 1]: three rounds of one delay each, not five, not one.
    assert_eq!(summary.successful_events, 5);
    assert!(elapsed >= Duration::from_millis(900), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_400), "too slow: {elapsed:?}");
}

#[tokio::test]
async fn test_batch_delay_only_between_groups() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let events: Vec<_> = (1..=4).map(|i| booking(&format!("evt-{i}"))).collect();
    let options =
        BatchOptions { batch_size: 2, delay_between_batches: Duration::from_millis(400) };

    let started = Instant::now();
    let summary = dispatcher(config_for(&server, 1)).batch_send(&events, &options).await;
    let elapsed = started.elapsed();

    // Two groups, one pause between them; none after the last group.
    assert_eq!(summary.successful_events, 4);
    assert!(elapsed >= Duration::from_millis(400), "delay skipped: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "trailing delay: {elapsed:?}");
}

#[tokio::test]
async fn test_batch_of_nothing_is_empty_summary() {
    let server = MockServer::start().await;
    let events: Vec<BookingEventPayload> = Vec::new();

    let summary =
        dispatcher(config_for(&server, 1)).batch_send(&events, &BatchOptions::default()).await;

    assert_eq!(summary.total_events, 0);
    assert!(summary.errors.is_empty());
}

// ============================================================================
// Circuit breaker, connection test, shared stats
// ============================================================================

#[tokio::test]
async fn test_guarded_send_stops_calling_open_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let breaker_config = CircuitBreakerConfig::builder()
        .failure_threshold(2)
        .cooldown(Duration::from_secs(30))
        .build()
        .expect("breaker config");
    let clock = MockClock::new();
    let breaker = CircuitBreaker::with_clock(breaker_config, clock.clone()).expect("breaker");
    let dispatcher = dispatcher(config_for(&server, 1));

    for _ in 0..2 {
        let result = dispatcher.send_guarded(&booking("evt-1"), None, &breaker).await;
        assert_eq!(result.error.as_deref(), Some("HTTP 500: Internal Server Error"));
    }

    let rejected = dispatcher.send_guarded(&booking("evt-1"), None, &breaker).await;
    assert!(!rejected.success);
    assert_eq!(
        rejected.error.as_deref(),
        Some("Circuit breaker is open, retry after 30s")
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_connection_check_sends_test_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-webhook-event-type", "webhook.test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = dispatcher(config_for(&server, 3)).test_connection().await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
}

#[tokio::test]
async fn test_shared_registry_aggregates_dispatchers() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let registry = Arc::new(StatsRegistry::new());
    let first = WebhookDispatcher::with_stats(config_for(&server, 1), Arc::clone(&registry))
        .expect("dispatcher");
    let second = WebhookDispatcher::with_stats(config_for(&server, 1), Arc::clone(&registry))
        .expect("dispatcher");

    first.send(&booking("evt-1"), None).await;
    second.send(&booking("evt-2"), None).await;

    assert_eq!(registry.snapshot().total_sent, 2);
    assert_eq!(first.stats(), second.stats());

    first.reset_stats();
    assert_eq!(second.stats().total_sent, 0);
}
