//! Modular common utilities shared across HookRelay crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types only
//! - `observability`: optional tracing (not included by default)
//! - `runtime`: async resilience primitives (retry executor, circuit breaker)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    retry_async, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitState, CircuitStatus, Clock, ConfigError, MockClock, ResilienceError,
    ResilienceResult, RetryConfig, RetryConfigBuilder, RetryExecutor, RetryOutcome, RetryPolicy,
    SystemClock,
};
