//! Error types used throughout the application

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for HookRelay
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum HookRelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for HookRelay operations
pub type Result<T> = std::result::Result<T, HookRelayError>;

/// Why a single webhook delivery attempt failed.
///
/// Closed set so retry policies can match on it exhaustively.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryError {
    /// Connection refused, DNS failure, broken pipe, ...
    #[error("{message}")]
    Network { message: String },

    /// No response within the configured timeout
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The receiver answered with a non-2xx status
    #[error("HTTP {status}: {status_text}")]
    HttpStatus { status: u16, status_text: String },

    /// The request could not be built (bad URL, unserializable body)
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl DeliveryError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX) }
    }

    pub fn http_status(status: u16, status_text: impl Into<String>) -> Self {
        Self::HttpStatus { status, status_text: status_text.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// HTTP status code, if the receiver responded at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Network failures and timeouts: the request may never have arrived.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Failures that a later attempt can plausibly fix.
    pub fn is_transient(&self) -> bool {
        self.is_connection_failure() || self.is_server_error() || self.is_rate_limited()
    }

    /// Stable label suitable for logging fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }
}

impl From<DeliveryError> for HookRelayError {
    fn from(value: DeliveryError) -> Self {
        match value {
            DeliveryError::InvalidRequest { message } => HookRelayError::InvalidInput(message),
            other => HookRelayError::Network(other.to_string()),
        }
    }
}
