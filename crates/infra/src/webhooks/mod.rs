//! Outbound webhook delivery
//!
//! - [`WebhookDispatcher`]: single, retrying, batch and breaker-guarded sends
//! - [`StatsRegistry`]: per-dispatcher delivery counters
//! - [`policies`]: retry presets keyed on [`hookrelay_domain::DeliveryError`]

pub mod dispatcher;
pub mod envelope;
pub mod policies;
pub mod stats;

pub use dispatcher::WebhookDispatcher;
pub use policies::{NetworkOnly, RateLimited, ServerErrors};
pub use stats::StatsRegistry;
