//! Configuration loading
//!
//! Builds a validated [`ClientConfig`](repolink_domain::ClientConfig) from
//! `REPOLINK_*` environment variables or a config file.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_dotenv, load_from_env, load_from_file, probe_config_paths};
