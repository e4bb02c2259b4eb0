//! Webhook configuration checks

use hookrelay_domain::{ConfigValidation, WebhookConfig};
use url::{Host, Url};

/// Check `config` without touching the network.
///
/// A missing URL is only a warning: the dispatcher runs in disabled mode.
/// Errors make the report invalid; warnings never do.
pub fn validate_config(config: &WebhookConfig) -> ConfigValidation {
    let mut report = ConfigValidation::default();

    match config.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
        None => report.warning("Webhook URL is not configured; delivery is disabled"),
        Some(raw) => {
            check_url(raw, &mut report);

            if config.secret().is_none() {
                report.warning(
                    "Webhook secret is not configured; receivers cannot authenticate requests",
                );
            }
            if !config.enabled {
                report.warning("Webhook URL is configured but delivery is disabled");
            }
        }
    }

    if config.retry_attempts == 0 {
        report.error("retry_attempts must be at least 1");
    }
    if config.timeout_ms == 0 {
        report.error("timeout_ms must be greater than 0");
    }
    if config.batch_size == 0 {
        report.warning("batch_size is 0; batches will be sent one event at a time");
    }

    report.finish()
}

fn check_url(raw: &str, report: &mut ConfigValidation) {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            report.error(format!("Invalid webhook URL '{raw}': {err}"));
            return;
        }
    };

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_local(&url) {
                report.warning(
                    "Webhook URL uses plain HTTP; payloads and secret are sent unencrypted",
                );
            }
        }
        other => report.error(format!("Webhook URL must use http or https, got '{other}'")),
    }
}

fn is_local(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
