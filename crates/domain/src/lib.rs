//! # HookRelay Domain
//!
//! Domain types and models for outbound webhook delivery.
//!
//! This crate contains:
//! - Error types (`HookRelayError`, the typed `DeliveryError`)
//! - Webhook configuration and its validation report
//! - The event payload, envelope and dispatch result types
//! - Statistics snapshots and domain constants
//!
//! ## Architecture
//! - No dependencies on other HookRelay crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
