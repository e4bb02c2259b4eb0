//! Example: checking a webhook receiver and sending a small batch
//!
//! Loads the webhook configuration (environment first, then
//! `hookrelay.{json,toml}`), validates it, sends a `webhook.test` event and
//! then a batch of sample booking events.
//!
//! # Setup
//!
//! 1. Point at a receiver, e.g. in a `.env` file:
//!    `HOOKRELAY_WEBHOOK_URL=https://webhook.site/<your-id>`
//!
//! 2. Run this example: `cargo run -p hookrelay-infra --example webhook_ping`
//!
//! Set `HOOKRELAY_LOG_FORMAT=json` for JSON logs.

use anyhow::Context;
use hookrelay_domain::{BatchOptions, BookingEventPayload};
use hookrelay_infra::observability::{self, LogFormat};
use hookrelay_infra::{config, WebhookDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let format = std::env::var("HOOKRELAY_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();
    observability::init_tracing(format);

    let webhook_config = config::load().context("loading webhook configuration")?;

    let report = config::validate_config(&webhook_config);
    for warning in &report.warnings {
        tracing::warn!(%warning, "configuration warning");
    }
    if !report.is_valid {
        anyhow::bail!("invalid webhook configuration: {}", report.errors.join("; "));
    }

    let dispatcher = WebhookDispatcher::new(webhook_config).context("building dispatcher")?;

    let ping = dispatcher.test_connection().await;
    println!("Connection test: {}", if ping.success { "ok" } else { "failed" });
    if let Some(error) = &ping.error {
        println!("  error: {error}");
    }

    let events: Vec<_> = (1..=3)
        .map(|n| {
            BookingEventPayload::new("booking.created", format!("Sample booking #{n}"))
                .with_metadata("sample", true)
        })
        .collect();
    let summary = dispatcher.batch_send(&events, &BatchOptions::default()).await;

    println!(
        "Batch: {} sent, {} succeeded, {} failed",
        summary.total_events, summary.successful_events, summary.failed_events
    );
    for error in &summary.errors {
        println!("  {error}");
    }

    println!("Stats: {}", serde_json::to_string_pretty(&dispatcher.stats())?);
    Ok(())
}
