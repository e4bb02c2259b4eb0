//! Results reported by the webhook dispatcher

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE};
use crate::errors::DeliveryError;

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

impl From<Result<(), DeliveryError>> for DispatchResult {
    fn from(value: Result<(), DeliveryError>) -> Self {
        match value {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Outcome of `send_with_retry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts actually made, at least 1
    pub attempts: u32,
}

impl RetryDispatchResult {
    pub fn ok(attempts: u32) -> Self {
        Self { success: true, error: None, attempts }
    }

    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self { success: false, error: Some(error.into()), attempts }
    }
}

/// How `batch_send` splits its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Events delivered concurrently per batch; 0 is treated as 1
    pub batch_size: usize,
    /// Pause between consecutive batches, not after the last one
    pub delay_between_batches: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay_between_batches: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }
}

/// Totals for a `batch_send` call.
///
/// `errors` entries read `"{event_id}: {error}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub errors: Vec<String>,
}

impl BatchSummary {
    pub fn record(&mut self, event_id: &str, result: &RetryDispatchResult) {
        if result.success {
            self.successful_events += 1;
        } else {
            self.failed_events += 1;
            let reason = result.error.as_deref().unwrap_or("unknown error");
            self.errors.push(format!("{event_id}: {reason}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_result_from_delivery_outcome() {
        assert_eq!(DispatchResult::from(Ok(())), DispatchResult::ok());

        let failed = DispatchResult::from(Err(DeliveryError::http_status(404, "Not Found")));
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("HTTP 404: Not Found"));
    }

    #[test]
    fn summary_tags_errors_with_event_id() {
        let mut summary = BatchSummary { total_events: 2, ..BatchSummary::default() };
        summary.record("evt_1", &RetryDispatchResult::ok(1));
        summary.record("evt_2", &RetryDispatchResult::failed("HTTP 500: Internal Server Error", 3));

        assert_eq!(summary.successful_events, 1);
        assert_eq!(summary.failed_events, 1);
        assert_eq!(summary.errors, vec!["evt_2: HTTP 500: Internal Server Error".to_string()]);
    }

    #[test]
    fn successful_result_omits_error_field() {
        let json = serde_json::to_value(RetryDispatchResult::ok(2)).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["attempts"], 2);
    }
}
