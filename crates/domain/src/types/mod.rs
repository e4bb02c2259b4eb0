//! Domain types and models
//!
//! Event payloads and the wire envelope, delivery results and statistics.

pub mod dispatch;
pub mod event;
pub mod stats;

pub use dispatch::{BatchOptions, BatchSummary, DispatchResult, RetryDispatchResult};
pub use event::{BookingEventPayload, SystemContext, WebhookEnvelope, WebhookEvent};
pub use stats::WebhookStatsSnapshot;
