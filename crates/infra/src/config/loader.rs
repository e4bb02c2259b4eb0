//! Configuration loader
//!
//! Loads the webhook configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `HOOKRELAY_WEBHOOK_URL` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. With neither source present, delivery stays disabled (default config)
//!
//! ## Environment Variables
//! - `HOOKRELAY_WEBHOOK_URL`: Receiver endpoint (required for env loading)
//! - `HOOKRELAY_WEBHOOK_SECRET`: Shared secret sent as `X-Webhook-Secret`
//! - `HOOKRELAY_WEBHOOK_ENABLED`: Master switch (true/false)
//! - `HOOKRELAY_WEBHOOK_RETRY_ATTEMPTS`: Attempts per event
//! - `HOOKRELAY_WEBHOOK_RETRY_BASE_DELAY_MS`: Base of the retry backoff
//! - `HOOKRELAY_WEBHOOK_TIMEOUT_MS`: Per-request timeout
//! - `HOOKRELAY_WEBHOOK_BATCH_SIZE`: Concurrency for batch sends
//! - `HOOKRELAY_WEBHOOK_BATCH_DELAY_MS`: Pause between batches
//! - `HOOKRELAY_WEBHOOK_USER_AGENT`: Outbound `User-Agent`
//! - `HOOKRELAY_ENVIRONMENT`: Reported in every envelope
//!
//! ## File Locations
//! The loader probes `hookrelay.json` and `hookrelay.toml` in the current
//! directory, its parent and grandparent, then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hookrelay_domain::{HookRelayError, Result, WebhookConfig};

pub const ENV_URL: &str = "HOOKRELAY_WEBHOOK_URL";
pub const ENV_SECRET: &str = "HOOKRELAY_WEBHOOK_SECRET";
pub const ENV_ENABLED: &str = "HOOKRELAY_WEBHOOK_ENABLED";
pub const ENV_RETRY_ATTEMPTS: &str = "HOOKRELAY_WEBHOOK_RETRY_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "HOOKRELAY_WEBHOOK_RETRY_BASE_DELAY_MS";
pub const ENV_TIMEOUT_MS: &str = "HOOKRELAY_WEBHOOK_TIMEOUT_MS";
pub const ENV_BATCH_SIZE: &str = "HOOKRELAY_WEBHOOK_BATCH_SIZE";
pub const ENV_BATCH_DELAY_MS: &str = "HOOKRELAY_WEBHOOK_BATCH_DELAY_MS";
pub const ENV_USER_AGENT: &str = "HOOKRELAY_WEBHOOK_USER_AGENT";
pub const ENV_ENVIRONMENT: &str = "HOOKRELAY_ENVIRONMENT";

const CONFIG_FILE_NAMES: [&str; 2] = ["hookrelay.json", "hookrelay.toml"];

/// Load configuration with automatic fallback strategy
///
/// Environment first when `HOOKRELAY_WEBHOOK_URL` is set, otherwise the
/// first config file found. When neither exists the default (disabled)
/// configuration is returned.
///
/// # Errors
/// Returns `HookRelayError::Config` if an environment value or a found file
/// is invalid. A bad environment value never falls through to a file.
pub fn load() -> Result<WebhookConfig> {
    if std::env::var_os(ENV_URL).is_some() {
        let config = load_from_env()?;
        tracing::info!("Webhook configuration loaded from environment variables");
        return Ok(config);
    }

    tracing::debug!("{ENV_URL} not set, trying config file");
    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::warn!("No webhook configuration found, delivery disabled");
            Ok(WebhookConfig::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `HOOKRELAY_WEBHOOK_URL` must be set; every other variable is optional and
/// falls back to the default.
///
/// # Errors
/// Returns `HookRelayError::Config` if the URL is missing or a numeric
/// variable does not parse.
pub fn load_from_env() -> Result<WebhookConfig> {
    let defaults = WebhookConfig::default();

    Ok(WebhookConfig {
        url: Some(env_var(ENV_URL)?),
        secret: std::env::var(ENV_SECRET).ok(),
        enabled: env_bool(ENV_ENABLED, defaults.enabled),
        retry_attempts: env_parse(ENV_RETRY_ATTEMPTS)?.unwrap_or(defaults.retry_attempts),
        retry_base_delay_ms: env_parse(ENV_RETRY_BASE_DELAY_MS)?
            .unwrap_or(defaults.retry_base_delay_ms),
        timeout_ms: env_parse(ENV_TIMEOUT_MS)?.unwrap_or(defaults.timeout_ms),
        batch_size: env_parse(ENV_BATCH_SIZE)?.unwrap_or(defaults.batch_size),
        batch_delay_ms: env_parse(ENV_BATCH_DELAY_MS)?.unwrap_or(defaults.batch_delay_ms),
        user_agent: std::env::var(ENV_USER_AGENT).unwrap_or(defaults.user_agent),
        environment: std::env::var(ENV_ENVIRONMENT).unwrap_or(defaults.environment),
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension; missing keys take their defaults.
///
/// # Errors
/// Returns `HookRelayError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<WebhookConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HookRelayError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            HookRelayError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading webhook configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HookRelayError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<WebhookConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HookRelayError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HookRelayError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HookRelayError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// Returns the first existing candidate, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        HookRelayError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional variable; unset is `Ok(None)`, garbage is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| HookRelayError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Anything else keeps `default`.
fn env_bool(key: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(key, value = %raw, default, "Unrecognised boolean, using default");
            default
        }
    }
}
