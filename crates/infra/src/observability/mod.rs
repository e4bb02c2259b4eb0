//! Structured logging setup using tracing.
//!
//! Library code only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to decide where they go.

use std::str::FromStr;

use hookrelay_domain::HookRelayError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Plain,
    /// One JSON object per event, fields flattened
    Json,
}

impl FromStr for LogFormat {
    type Err = HookRelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "pretty" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(HookRelayError::InvalidInput(format!("unknown log format: {other}"))),
        }
    }
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` if a subscriber was already installed; calling this more
/// than once is harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    init_tracing_with_filter(format, DEFAULT_FILTER)
}

/// Like [`init_tracing`] with an explicit fallback filter directive.
pub fn init_tracing_with_filter(format: LogFormat, fallback: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = match format {
        LogFormat::Plain => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .with(filter)
            .try_init(),
    }
    .is_ok();

    if installed {
        tracing::debug!(?format, "tracing initialized");
    }
    installed
}
