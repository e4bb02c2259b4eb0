//! Resilience patterns for fault tolerance and error handling
//!
//! This module provides **generic, reusable** resilience patterns:
//! - **Retry Logic**: jitter-free exponential (or fixed) backoff with a
//!   pluggable [`RetryPolicy`] deciding which failures are retryable
//! - **Circuit Breaker**: stops calling a downstream that keeps failing and
//!   lets a single probe through once the cooldown has elapsed
//!
//! Both primitives are generic over the operation's error type. The retry
//! executor hands back the *last underlying error* unchanged, so callers can
//! still match on its variants (HTTP status, timeout, ...). The circuit
//! breaker wraps that error in [`ResilienceError::Operation`] and adds the
//! synthetic [`ResilienceError::CircuitOpen`] rejection.
//!
//! Time-dependent breaker behaviour is driven through the [`Clock`] trait so
//! tests can use [`MockClock`] instead of sleeping.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitState,
    CircuitStatus, Clock, ConfigError, ConfigResult, MockClock, ResilienceError,
    ResilienceResult, SystemClock,
};
// Re-export retry types
pub use retry::{
    policies, retry_async, RetryConfig, RetryConfigBuilder, RetryExecutor, RetryOutcome,
    RetryPolicy,
};
