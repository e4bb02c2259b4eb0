//! Application constants
//!
//! Centralized location for webhook delivery defaults and wire names.

// Delivery defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1_000;
pub const DEFAULT_USER_AGENT: &str = "HookRelay-Webhook/1.0";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Response bodies longer than this are truncated before logging
pub const MAX_LOGGED_BODY_BYTES: usize = 1_024;

// Outbound headers
pub const HEADER_WEBHOOK_SECRET: &str = "X-Webhook-Secret";
pub const HEADER_EVENT_ID: &str = "X-Webhook-Event-Id";
pub const HEADER_EVENT_TYPE: &str = "X-Webhook-Event-Type";

/// Event type used by connectivity checks
pub const TEST_EVENT_TYPE: &str = "webhook.test";
