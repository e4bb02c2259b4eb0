//! Delivery statistics registry

use std::time::Duration;

use hookrelay_domain::WebhookStatsSnapshot;
use parking_lot::Mutex;

/// Thread-safe delivery counters.
///
/// One registry per dispatcher by default; wrap it in an `Arc` and hand it to
/// several dispatchers to aggregate their counters.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    inner: Mutex<WebhookStatsSnapshot>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.inner.lock().record(true, millis(elapsed), None);
    }

    pub fn record_failure(&self, elapsed: Duration, error: impl Into<String>) {
        self.inner.lock().record(false, millis(elapsed), Some(error.into()));
    }

    pub fn snapshot(&self) -> WebhookStatsSnapshot {
        self.inner.lock().clone()
    }

    /// Zero every counter and clear the last error.
    pub fn reset(&self) {
        *self.inner.lock() = WebhookStatsSnapshot::default();
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.0
}
