//! Webhook dispatcher
//!
//! Delivers events to the configured endpoint. Every public operation folds
//! failures into a result value; nothing here returns `Err` or panics once the
//! dispatcher is built.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use hookrelay_common::resilience::{
    policies::AlwaysRetry, CircuitBreaker, Clock, ResilienceError, RetryConfig, RetryExecutor,
    RetryPolicy,
};
use hookrelay_domain::{
    BatchOptions, BatchSummary, BookingEventPayload, DeliveryError, DispatchResult, Result,
    RetryDispatchResult, WebhookConfig, WebhookEvent, WebhookStatsSnapshot,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::envelope::{build_envelope, build_headers};
use super::stats::StatsRegistry;
use crate::http::{DeliveryResponse, HttpClient};

/// Sends webhook events for one endpoint configuration.
///
/// Cheap to clone; clones share the HTTP connection pool and statistics.
#[derive(Clone, Debug)]
pub struct WebhookDispatcher {
    config: Arc<WebhookConfig>,
    client: HttpClient,
    stats: Arc<StatsRegistry>,
}

impl WebhookDispatcher {
    /// Dispatcher with its own, zeroed statistics.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        Self::with_stats(config, Arc::new(StatsRegistry::new()))
    }

    /// Dispatcher recording into an existing registry.
    pub fn with_stats(config: WebhookConfig, stats: Arc<StatsRegistry>) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config: Arc::new(config), client, stats })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub fn stats(&self) -> WebhookStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stats_registry(&self) -> Arc<StatsRegistry> {
        Arc::clone(&self.stats)
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Deliver `event` once.
    ///
    /// With delivery disabled (no URL, or `enabled = false`) this succeeds
    /// without any HTTP call and leaves the statistics untouched.
    #[instrument(skip_all, fields(event_id = %event.event_id(), event_type = %event.event_type()))]
    pub async fn send<E: WebhookEvent>(&self, event: &E, context: Option<&Value>) -> DispatchResult {
        self.deliver(event, context).await.into()
    }

    /// Deliver `event`, retrying every failure with `2^(n-1) * base` backoff.
    pub async fn send_with_retry<E: WebhookEvent>(
        &self,
        event: &E,
        context: Option<&Value>,
    ) -> RetryDispatchResult {
        self.send_with_policy(event, context, AlwaysRetry).await
    }

    /// Like [`send_with_retry`](Self::send_with_retry) but only retries
    /// failures accepted by `policy`.
    #[instrument(skip_all, fields(event_id = %event.event_id(), max_attempts = self.config.retry_attempts))]
    pub async fn send_with_policy<E, P>(
        &self,
        event: &E,
        context: Option<&Value>,
        policy: P,
    ) -> RetryDispatchResult
    where
        E: WebhookEvent,
        P: RetryPolicy<DeliveryError>,
    {
        let event_id = event.event_id().to_owned();
        let executor = RetryExecutor::new(self.retry_config(), policy).on_retry(move |retry| {
            warn!(
                event_id = %event_id,
                attempt = retry.attempt,
                delay_ms = retry.delay.as_millis() as u64,
                error = %retry.error,
                "webhook attempt failed, retrying"
            );
        });

        let outcome = executor.execute_with_outcome(|| self.deliver(event, context)).await;

        match outcome.result {
            Ok(()) => RetryDispatchResult::ok(outcome.attempts),
            Err(err) => {
                error!(
                    event_id = %event.event_id(),
                    attempts = outcome.attempts,
                    error = %err,
                    "webhook delivery failed after retries"
                );
                RetryDispatchResult::failed(err.to_string(), outcome.attempts)
            }
        }
    }

    /// Deliver many events, `batch_size` at a time.
    ///
    /// Events inside a batch run concurrently through `send_with_retry`; one
    /// failure never affects another. Batches run one after another with
    /// `delay_between_batches` in between.
    #[instrument(skip_all, fields(total = events.len(), batch_size = options.batch_size))]
    pub async fn batch_send<E: WebhookEvent>(
        &self,
        events: &[E],
        options: &BatchOptions,
    ) -> BatchSummary {
        let batch_size = options.batch_size.max(1);
        let batch_count = events.len().div_ceil(batch_size);
        let mut summary = BatchSummary { total_events: events.len(), ..BatchSummary::default() };

        for (index, batch) in events.chunks(batch_size).enumerate() {
            debug!(batch = index + 1, of = batch_count, size = batch.len(), "sending webhook batch");

            let results =
                join_all(batch.iter().map(|event| self.send_with_retry(event, None))).await;
            for (event, result) in batch.iter().zip(&results) {
                summary.record(event.event_id(), result);
            }

            if index + 1 < batch_count && !options.delay_between_batches.is_zero() {
                tokio::time::sleep(options.delay_between_batches).await;
            }
        }

        info!(
            total = summary.total_events,
            succeeded = summary.successful_events,
            failed = summary.failed_events,
            "webhook batch complete"
        );
        summary
    }

    /// Batch send using the configured batch size and delay.
    pub async fn batch_send_default<E: WebhookEvent>(&self, events: &[E]) -> BatchSummary {
        let options = BatchOptions {
            batch_size: self.config.batch_size,
            delay_between_batches: self.config.batch_delay(),
        };
        self.batch_send(events, &options).await
    }

    /// Deliver through `breaker` using the configured retry schedule.
    ///
    /// While the circuit is open the call is rejected without touching the
    /// network and the rejection is reported as the result's error.
    pub async fn send_guarded<E, C>(
        &self,
        event: &E,
        context: Option<&Value>,
        breaker: &CircuitBreaker<C>,
    ) -> DispatchResult
    where
        E: WebhookEvent,
        C: Clock,
    {
        let executor = RetryExecutor::new(self.retry_config(), AlwaysRetry);
        match breaker.execute_with(&executor, || self.deliver(event, context)).await {
            Ok(()) => DispatchResult::ok(),
            Err(ResilienceError::Operation(err)) => DispatchResult::failed(err.to_string()),
            Err(rejected) => {
                warn!(
                    event_id = %event.event_id(),
                    retry_after_secs = rejected.retry_after_secs(),
                    "webhook skipped, circuit open"
                );
                DispatchResult::failed(rejected.to_string())
            }
        }
    }

    /// Send one synthetic `webhook.test` event without retrying.
    pub async fn test_connection(&self) -> DispatchResult {
        if !self.config.is_active() {
            return DispatchResult::failed("webhook URL not configured or delivery disabled");
        }
        let event = BookingEventPayload::connection_test();
        let context = serde_json::json!({ "test": true });
        self.send(&event, Some(&context)).await
    }

    /// Retry schedule for this endpoint: `retry_attempts` attempts, delays
    /// doubling from `retry_base_delay`, uncapped within that range.
    pub fn retry_config(&self) -> RetryConfig {
        let max_attempts = self.config.retry_attempts.max(1);
        let base = self.config.retry_base_delay();
        let growth = 1u32.checked_shl(max_attempts - 1).unwrap_or(u32::MAX);

        RetryConfig {
            max_attempts,
            initial_delay: base,
            max_delay: base.saturating_mul(growth),
            backoff_multiplier: 2.0,
            exponential_backoff: true,
        }
    }

    /// One attempt, with statistics. `Ok` without I/O when disabled.
    async fn deliver<E: WebhookEvent>(
        &self,
        event: &E,
        context: Option<&Value>,
    ) -> std::result::Result<(), DeliveryError> {
        let Some(target) = self.config.target_url() else {
            debug!(event_id = %event.event_id(), "webhook delivery disabled, skipping");
            return Ok(());
        };

        let started = Instant::now();
        let outcome = self.post(target, event, context).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(response) => {
                self.stats.record_success(elapsed);
                info!(
                    event_id = %event.event_id(),
                    status = response.status,
                    duration_ms = millis(elapsed),
                    "webhook delivered"
                );
            }
            Err(err) => {
                self.stats.record_failure(elapsed, err.to_string());
                warn!(
                    event_id = %event.event_id(),
                    kind = err.label(),
                    error = %err,
                    duration_ms = millis(elapsed),
                    "webhook delivery attempt failed"
                );
            }
        }

        outcome.map(|_| ())
    }

    async fn post<E: WebhookEvent>(
        &self,
        target: &str,
        event: &E,
        context: Option<&Value>,
    ) -> std::result::Result<DeliveryResponse, DeliveryError> {
        let url = Url::parse(target)
            .map_err(|err| DeliveryError::invalid_request(format!("invalid webhook URL: {err}")))?;
        let envelope = build_envelope(event, context, &self.config.environment)?;
        let headers = build_headers(&envelope, self.config.secret())?;
        let body = serde_json::to_vec(&envelope).map_err(|err| {
            DeliveryError::invalid_request(format!("failed to serialize envelope: {err}"))
        })?;

        self.client.post_json(&url, body, headers).await
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
