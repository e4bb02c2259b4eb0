//! Webhook delivery configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_ENVIRONMENT, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT,
};

/// Settings for a single outbound webhook endpoint.
///
/// Every field has a default, so a partial JSON/TOML document (or an empty
/// one) deserializes into a usable config. With no `url` the dispatcher runs
/// in disabled mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Receiver endpoint; `None` disables delivery
    pub url: Option<String>,

    /// Shared secret sent as `X-Webhook-Secret`
    pub secret: Option<String>,

    /// Master switch; `false` turns every send into a no-op
    pub enabled: bool,

    /// Maximum attempts per event in `send_with_retry`
    pub retry_attempts: u32,

    /// Hard timeout for one HTTP request
    pub timeout_ms: u64,

    /// Base of the `2^(attempt-1) * base` retry schedule
    pub retry_base_delay_ms: u64,

    /// Default concurrency for `batch_send`
    pub batch_size: usize,

    /// Default pause between batches
    pub batch_delay_ms: u64,

    pub user_agent: String,

    /// Reported in the envelope's `systemContext.environment`
    pub environment: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            enabled: true,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl WebhookConfig {
    /// Config pointing at `url` with every other field defaulted.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), ..Self::default() }
    }

    /// The URL to deliver to, or `None` when delivery is switched off.
    ///
    /// Blank strings count as unset.
    pub fn target_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.target_url().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Secret, ignoring blank values
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Outcome of checking a [`WebhookConfig`].
///
/// Warnings never make a config invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Seal the report: valid iff no errors were recorded.
    pub fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = WebhookConfig::default();
        assert!(config.url.is_none());
        assert!(config.enabled);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.user_agent, "HookRelay-Webhook/1.0");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: WebhookConfig =
            serde_json::from_str(r#"{"url":"https://hooks.example.com/in","retry_attempts":5}"#)
                .unwrap();
        assert_eq!(config.target_url(), Some("https://hooks.example.com/in"));
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn disabled_or_blank_url_is_inactive() {
        let mut config = WebhookConfig::with_url("https://hooks.example.com");
        assert!(config.is_active());

        config.enabled = false;
        assert!(!config.is_active());

        let blank = WebhookConfig::with_url("   ");
        assert_eq!(blank.target_url(), None);
    }

    #[test]
    fn blank_secret_is_ignored() {
        let config = WebhookConfig { secret: Some(" ".into()), ..WebhookConfig::default() };
        assert_eq!(config.secret(), None);
    }

    #[test]
    fn validation_report_validity_tracks_errors() {
        let mut report = ConfigValidation::default();
        report.warning("no secret");
        assert!(report.clone().finish().is_valid);

        report.error("bad url");
        let report = report.finish();
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["bad url".to_string()]);
    }
}
