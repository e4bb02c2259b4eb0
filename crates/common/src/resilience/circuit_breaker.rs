//! Circuit breaker guarding a single downstream endpoint
//!
//! State machine:
//!
//! ```text
//! Closed --(failures >= threshold)--> Open --(cooldown elapsed)--> HalfOpen
//!   ^                                  ^                              |
//!   |                                  +-------(probe fails)----------+
//!   +-------------------------------(probe succeeds)------------------+
//! ```
//!
//! While open, calls are rejected without running the operation. Once the
//! cooldown has elapsed exactly one caller is admitted as a probe; everyone
//! else keeps being rejected until the probe settles.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::retry::{policies::AlwaysRetry, RetryConfig, RetryExecutor, RetryPolicy};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a test can keep one handle and
/// advance the clock the breaker is reading from.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned by [`CircuitBreaker::execute`]
///
/// `Operation` carries the operation's final error untouched.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// Circuit breaker is open, the operation was not attempted
    #[error("Circuit breaker is open, retry after {}s", ceil_secs(.retry_after))]
    CircuitOpen { retry_after: Duration },

    /// The underlying operation failed (after any retries)
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Remaining cooldown in whole seconds, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::CircuitOpen { retry_after } => Some(ceil_secs(retry_after)),
            Self::Operation(_) => None,
        }
    }

    /// Unwrap the operation error, if this is one.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::CircuitOpen { .. } => None,
        }
    }
}

fn ceil_secs(duration: &Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Cooldown elapsed, a single probe request is in flight
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls before opening the circuit
    pub failure_threshold: u32,
    /// Time to stay open before admitting a probe
    pub cooldown: Duration,
    /// Retry schedule used by [`CircuitBreaker::execute`]
    pub retry: RetryConfig,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        self.retry.validate()
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of a breaker, free of side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failures: u32,
    pub is_open: bool,
    pub last_failure_time: Option<Instant>,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            probe_in_flight: false,
        }
    }
}

/// Circuit breaker for one logical downstream.
///
/// Cloning is cheap and clones share state, which is how concurrent callers
/// of the same endpoint are expected to use it.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self {
            config: Arc::new(CircuitBreakerConfig::default()),
            inner: Arc::new(Mutex::new(BreakerState::closed())),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Admission ticket for one call; settles the breaker when dropped unsettled.
struct CallPermit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
    settled: bool,
}

impl<C: Clock> CallPermit<'_, C> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl<C: Clock> Drop for CallPermit<'_, C> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            // Abandoned probe: fall back to open so the next caller can probe.
            let mut inner = self.breaker.inner.lock();
            inner.probe_in_flight = false;
            if inner.state == CircuitState::HalfOpen {
                inner.state = CircuitState::Open;
            }
            debug!("circuit breaker probe abandoned before completion");
        }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(BreakerState::closed())),
            clock: Arc::new(clock),
        })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute `operation` through the breaker using the configured retry
    /// schedule and a retry-everything policy.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let executor = RetryExecutor::new(self.config.retry.clone(), AlwaysRetry);
        self.execute_with(&executor, operation).await
    }

    /// Execute `operation` through the breaker with a caller-supplied retry
    /// executor.
    ///
    /// The whole retry sequence counts as one call: a single success closes
    /// the circuit, exhaustion counts as one failure.
    #[instrument(skip_all, fields(state = %self.state()))]
    pub async fn execute_with<P, F, Fut, T, E>(
        &self,
        executor: &RetryExecutor<P>,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        P: RetryPolicy<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let permit = match self.acquire() {
            Ok(permit) => permit,
            Err(retry_after) => {
                debug!(retry_after_ms = retry_after.as_millis() as u64, "circuit breaker rejecting call");
                return Err(ResilienceError::CircuitOpen { retry_after });
            }
        };

        match executor.execute(operation).await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(error) => {
                permit.fail();
                Err(ResilienceError::Operation(error))
            }
        }
    }

    /// Decide whether a call may proceed; `Err` carries the remaining cooldown.
    fn acquire(&self) -> Result<CallPermit<'_, C>, Duration> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(CallPermit { breaker: self, probe: false, settled: false }),
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(Duration::ZERO)
                } else {
                    inner.probe_in_flight = true;
                    Ok(CallPermit { breaker: self, probe: true, settled: false })
                }
            }
            CircuitState::Open => {
                let cooldown = self.config.cooldown;
                let since_failure = inner
                    .last_failure_time
                    .map_or(cooldown, |at| self.clock.now().saturating_duration_since(at));

                if since_failure < cooldown {
                    return Err(cooldown - since_failure);
                }

                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                info!(failures = inner.failure_count, "circuit breaker half-open, admitting probe");
                Ok(CallPermit { breaker: self, probe: true, settled: false })
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock();
        let previous = inner.state;

        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
        if probe {
            inner.probe_in_flight = false;
        }

        if previous != CircuitState::Closed {
            info!(previous = %previous, "circuit breaker closed");
        }
    }

    fn on_failure(&self, probe: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(now);

        if probe {
            inner.probe_in_flight = false;
            inner.state = CircuitState::Open;
            warn!(failures = inner.failure_count, "circuit breaker probe failed, reopening");
        } else if inner.state == CircuitState::Closed
            && inner.failure_count >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            warn!(failures = inner.failure_count, "circuit breaker opened");
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot for monitoring
    pub fn status(&self) -> CircuitStatus {
        let inner = self.inner.lock();
        CircuitStatus {
            state: inner.state,
            failures: inner.failure_count,
            is_open: inner.state != CircuitState::Closed,
            last_failure_time: inner.last_failure_time,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::closed();
        info!("circuit breaker manually reset to closed state");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::sync::Notify;

    use super::*;

    fn single_attempt() -> RetryConfig {
        RetryConfig::builder().max_attempts(1).build().unwrap()
    }

    fn breaker(threshold: u32, cooldown: Duration, clock: MockClock) -> CircuitBreaker<MockClock> {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .cooldown(cooldown)
            .retry(single_attempt())
            .build()
            .unwrap();
        CircuitBreaker::with_clock(config, clock).unwrap()
    }

    async fn fail_once(cb: &CircuitBreaker<MockClock>, calls: &AtomicU32) -> ResilienceError<String> {
        cb.execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("downstream unavailable".to_string()) }
        })
        .await
        .unwrap_err()
    }

    #[test]
    fn test_mock_clock_advance_is_shared_between_clones() {
        let clock = MockClock::new();
        let start = clock.now();
        let handle = clock.clone();

        handle.advance(Duration::from_secs(5));
        clock.advance_millis(500);

        assert_eq!(clock.now().duration_since(start), Duration::from_millis(5500));
        assert_eq!(handle.elapsed(), Duration::from_millis(5500));
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::builder().failure_threshold(0).build().is_err());
        let bad_retry = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert!(CircuitBreakerConfig::builder().retry(bad_retry).build().is_err());
        assert!(CircuitBreakerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_retry_after_is_rounded_up_to_whole_seconds() {
        let err = ResilienceError::<String>::CircuitOpen { retry_after: Duration::from_millis(1500) };
        assert_eq!(err.retry_after_secs(), Some(2));
        assert_eq!(err.to_string(), "Circuit breaker is open, retry after 2s");

        let err = ResilienceError::Operation("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.retry_after_secs(), None);
    }

    /// After three failures the fourth call is rejected without running the
    /// operation.
    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let clock = MockClock::new();
        let cb = breaker(3, Duration::from_secs(30), clock.clone());
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let err = fail_once(&cb, &calls).await;
            assert!(matches!(err, ResilienceError::Operation(_)));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(10));
        let err = fail_once(&cb, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3, "operation must not run while open");
        assert!(err.is_circuit_open());
        assert!(err.to_string().contains("retry after 20s"), "got: {err}");
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(30), MockClock::new());
        let calls = AtomicU32::new(0);

        fail_once(&cb, &calls).await;
        fail_once(&cb, &calls).await;
        cb.execute(|| async { Ok::<_, String>(()) }).await.unwrap();
        fail_once(&cb, &calls).await;

        let status = cb.status();
        assert_eq!(status.failures, 1);
        assert!(!status.is_open);
        assert!(status.last_failure_time.is_some());
    }

    #[tokio::test]
    async fn test_probe_after_cooldown_closes_circuit() {
        let clock = MockClock::new();
        let cb = breaker(2, Duration::from_secs(30), clock.clone());
        let calls = AtomicU32::new(0);

        fail_once(&cb, &calls).await;
        fail_once(&cb, &calls).await;
        assert!(cb.status().is_open);

        clock.advance(Duration::from_secs(31));
        let value = cb
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>("recovered") }
            })
            .await
            .unwrap();

        assert_eq!(value, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.status().failures, 0);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_with_fresh_cooldown() {
        let clock = MockClock::new();
        let cb = breaker(1, Duration::from_secs(30), clock.clone());
        let calls = AtomicU32::new(0);

        fail_once(&cb, &calls).await;
        clock.advance(Duration::from_secs(30));
        let err = fail_once(&cb, &calls).await;
        assert!(matches!(err, ResilienceError::Operation(_)));
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(5));
        let err = fail_once(&cb, &calls).await;
        assert_eq!(err.retry_after_secs(), Some(25));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Only one caller may probe; concurrent callers are turned away until it
    /// settles.
    #[tokio::test]
    async fn test_half_open_admits_a_single_probe() {
        let clock = MockClock::new();
        let cb = breaker(1, Duration::from_secs(1), clock.clone());
        let calls = AtomicU32::new(0);
        fail_once(&cb, &calls).await;
        clock.advance(Duration::from_secs(2));

        let release = Arc::new(Notify::new());
        let probe_cb = cb.clone();
        let gate = Arc::clone(&release);
        let probe = tokio::spawn(async move {
            probe_cb
                .execute(|| {
                    let gate = Arc::clone(&gate);
                    async move {
                        gate.notified().await;
                        Ok::<_, String>(())
                    }
                })
                .await
        });

        while cb.state() != CircuitState::HalfOpen {
            tokio::task::yield_now().await;
        }

        let err = fail_once(&cb, &calls).await;
        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        probe.await.unwrap().unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_probe_allows_next_probe() {
        let clock = MockClock::new();
        let cb = breaker(1, Duration::from_secs(1), clock.clone());
        let calls = AtomicU32::new(0);
        fail_once(&cb, &calls).await;
        clock.advance(Duration::from_secs(2));

        let hung = cb.execute(|| std::future::pending::<Result<(), String>>());
        assert!(tokio::time::timeout(Duration::from_millis(10), hung).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        cb.execute(|| async { Ok::<_, String>(()) }).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let cb = breaker(1, Duration::from_secs(600), MockClock::new());
        let calls = AtomicU32::new(0);
        fail_once(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();

        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failures, 0);
        assert_eq!(status.last_failure_time, None);
    }
}
