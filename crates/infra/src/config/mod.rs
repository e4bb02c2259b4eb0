//! Configuration loading and validation
//!
//! This module loads the webhook configuration from environment variables
//! and files, and checks it before a dispatcher is built.

pub mod loader;
pub mod validation;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
pub use validation::validate_config;
