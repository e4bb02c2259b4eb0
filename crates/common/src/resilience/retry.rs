//! Generic retry executor with jitter-free backoff
//!
//! The executor runs an async operation up to `max_attempts` times. Between
//! attempts it sleeps for a delay derived from [`RetryConfig`]; a
//! [`RetryPolicy`] decides whether a given failure is worth retrying at all.
//!
//! Unlike a wrapping retry layer, the executor returns the **last underlying
//! error** once it gives up, so callers keep full access to the original error
//! shape (HTTP status, timeout, ...).

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Return `true` if the failed `attempt` (1-based) should be followed by
    /// another one.
    fn should_retry(&self, error: &E, attempt: u32) -> bool;
}

impl<E, P> RetryPolicy<E> for Arc<P>
where
    P: RetryPolicy<E> + ?Sized,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        (**self).should_retry(error, attempt)
    }
}

impl<E, P> RetryPolicy<E> for &P
where
    P: RetryPolicy<E> + ?Sized,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        (**self).should_retry(error, attempt)
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per attempt when `exponential_backoff` is set
    pub backoff_multiplier: f64,
    /// Grow the delay exponentially instead of keeping it fixed
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            exponential_backoff: true,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                message: "backoff_multiplier must be a finite value >= 1".to_string(),
            });
        }

        Ok(())
    }

    /// Delay to wait after the failed `attempt` (1-based).
    ///
    /// Exponential: `min(initial * multiplier^(attempt-1), max)`.
    /// Fixed: `min(initial, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff || self.initial_delay.is_zero() {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Exponential backoff with the given start, growth factor and cap.
    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.exponential_backoff = true;
        self.config.initial_delay = initial_delay;
        self.config.backoff_multiplier = multiplier;
        self.config.max_delay = max_delay;
        self
    }

    /// Same delay between every attempt.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.exponential_backoff = false;
        self.config.initial_delay = delay;
        self.config.max_delay = self.config.max_delay.max(delay);
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Details handed to an `on_retry` hook before the executor sleeps.
#[derive(Clone, Copy)]
pub struct RetryAttempt<'a> {
    /// The attempt that just failed (1-based)
    pub attempt: u32,
    /// Delay before the next attempt
    pub delay: Duration,
    /// The failure that triggered the retry
    pub error: &'a dyn fmt::Display,
}

/// Side-effect hook invoked before every backoff sleep.
pub type RetryHook = Arc<dyn Fn(&RetryAttempt<'_>) + Send + Sync>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Sum of all backoff delays that were actually slept
    pub total_delay: Duration,
    /// The loop ended because the cancellation token fired during a sleep
    pub cancelled: bool,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Average delay between attempts (excludes operation execution time).
    pub fn average_delay(&self) -> Duration {
        if self.attempts <= 1 {
            return Duration::ZERO;
        }
        self.total_delay / (self.attempts - 1)
    }
}

/// The main retry executor
#[derive(Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
    on_retry: Option<RetryHook>,
    cancellation: Option<CancellationToken>,
}

impl<P> fmt::Debug for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("has_on_retry", &self.on_retry.is_some())
            .field("cancellable", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy, on_retry: None, cancellation: None }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    /// Register a hook that runs before each backoff sleep.
    #[must_use]
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryAttempt<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Allow the backoff sleep to be interrupted by `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Execute an operation with retry logic.
    ///
    /// Returns the first success, or the last underlying error once the
    /// attempts are exhausted, the policy declines, or the executor is
    /// cancelled.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut total_delay = Duration::ZERO;
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, "executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        total_delay,
                        cancelled: false,
                    };
                }
                Err(error) => error,
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "retry attempts exhausted");
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                    total_delay,
                    cancelled: false,
                };
            }

            if !self.policy.should_retry(&error, attempt) {
                debug!(attempt, error = %error, "retry policy declined to retry");
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                    total_delay,
                    cancelled: false,
                };
            }

            let delay = self.config.delay_for_attempt(attempt);
            if let Some(hook) = &self.on_retry {
                hook(&RetryAttempt { attempt, delay, error: &error });
            }

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "operation failed, retrying"
            );

            if !self.sleep(delay).await {
                warn!(attempt, "retry cancelled during backoff");
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                    total_delay,
                    cancelled: true,
                };
            }

            total_delay += delay;
            attempt += 1;
        }
    }

    /// Sleep for `delay`; returns `false` if cancelled first.
    async fn sleep(&self, delay: Duration) -> bool {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => false,
                    () = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

/// Convenience function to create a retry executor and execute an operation
pub async fn retry_async<F, Fut, T, E, P>(config: RetryConfig, policy: P, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    RetryExecutor::new(config, policy).execute(operation).await
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::RetryPolicy;

    /// Retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> bool {
            true
        }
    }

    /// Never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> bool {
            false
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> bool {
            (self.predicate)(error, attempt)
        }
    }
}
