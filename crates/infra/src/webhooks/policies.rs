//! Retry presets for webhook delivery
//!
//! Each preset is a [`RetryPolicy`] over [`DeliveryError`]. The dispatcher's
//! default (`send_with_retry`) retries every failure; pass one of these to
//! `send_with_policy` to be selective.

use hookrelay_common::resilience::RetryPolicy;
use hookrelay_domain::DeliveryError;

/// Retry only when the request may never have reached the receiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkOnly;

impl RetryPolicy<DeliveryError> for NetworkOnly {
    fn should_retry(&self, error: &DeliveryError, _attempt: u32) -> bool {
        matches!(error, DeliveryError::Network { .. } | DeliveryError::Timeout { .. })
    }
}

/// Network failures, timeouts, 5xx and 429.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerErrors;

impl RetryPolicy<DeliveryError> for ServerErrors {
    fn should_retry(&self, error: &DeliveryError, _attempt: u32) -> bool {
        match error {
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. } => true,
            DeliveryError::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            DeliveryError::InvalidRequest { .. } => false,
        }
    }
}

/// Only `429 Too Many Requests`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimited;

impl RetryPolicy<DeliveryError> for RateLimited {
    fn should_retry(&self, error: &DeliveryError, _attempt: u32) -> bool {
        matches!(error, DeliveryError::HttpStatus { status: 429, .. })
    }
}
