//! Delivery statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/* -------------------------------------------------------------------------- */
/* Webhook Statistics */
/* -------------------------------------------------------------------------- */

/// Point-in-time copy of a dispatcher's delivery counters.
///
/// Counts delivery attempts made through `send`; a disabled no-op send is not
/// an attempt. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookStatsSnapshot {
    /// Attempts made (successful + failed)
    pub total_sent: u64,

    /// Attempts answered with a 2xx
    pub successful_sent: u64,

    /// Attempts that failed for any reason
    pub failed_sent: u64,

    /// Running mean latency over all attempts, in milliseconds
    pub average_response_time_ms: f64,

    /// When the last attempt finished
    pub last_sent_at: Option<DateTime<Utc>>,

    /// Message of the most recent failure; kept after later successes
    pub last_error: Option<String>,
}

impl WebhookStatsSnapshot {
    /// Fold one attempt into the counters.
    ///
    /// The mean is updated incrementally as `(avg * (n - 1) + new) / n`.
    pub fn record(&mut self, success: bool, response_time_ms: f64, error: Option<String>) {
        self.total_sent += 1;
        if success {
            self.successful_sent += 1;
        } else {
            self.failed_sent += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.total_sent as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * (n - 1.0) + response_time_ms) / n;

        self.last_sent_at = Some(Utc::now());
        if error.is_some() {
            self.last_error = error;
        }
    }

    /// Fraction of attempts that succeeded, `None` before the first attempt
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_sent == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.successful_sent as f64 / self.total_sent as f64;
        Some(rate)
    }
}
