//! # HookRelay Infrastructure
//!
//! Impure side of webhook delivery.
//!
//! This crate contains:
//! - Configuration loading (environment, JSON/TOML files) and validation
//! - The reqwest-backed HTTP client
//! - The webhook dispatcher, its statistics registry and retry presets
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Builds on `hookrelay-common` (resilience) and `hookrelay-domain` (types)
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod webhooks;

// Re-export commonly used items
pub use config::validate_config;
pub use errors::InfraError;
pub use http::HttpClient;
pub use webhooks::{StatsRegistry, WebhookDispatcher};
