//! Logging bootstrap
//!
//! Library code only emits `tracing` events and spans. Binaries and tests
//! that want to see them call [`init_tracing`] once at startup.
//!
//! ## Environment
//! - `REPOLINK_LOG`: filter directives, falling back to `RUST_LOG`, then
//!   `info`
//! - `REPOLINK_LOG_FORMAT`: `pretty` (default) or `json`

use std::sync::OnceLock;

use repolink_domain::impl_domain_status_conversions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_domain_status_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

impl LogFormat {
    /// Format from `REPOLINK_LOG_FORMAT`, defaulting to pretty.
    pub fn from_env() -> Self {
        std::env::var("REPOLINK_LOG_FORMAT").ok().and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

/// Filter from `REPOLINK_LOG`, then `RUST_LOG`, then `info`.
fn env_filter() -> EnvFilter {
    ["REPOLINK_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Idempotent: later calls return the first call's result. Returns `false`
/// when another subscriber was already installed, which is left in place.
pub fn init_tracing(format: LogFormat) -> bool {
    *TRACING_INITIALIZED.get_or_init(|| {
        let registry = tracing_subscriber::registry().with(env_filter());
        let installed = match format {
            LogFormat::Pretty => {
                registry.with(fmt::layer().with_target(true).with_level(true)).try_init().is_ok()
            }
            LogFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(false))
                .try_init()
                .is_ok(),
        };

        if installed {
            tracing::debug!(?format, "tracing initialized");
        }
        installed
    })
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    #[serial]
    fn test_log_format_from_env_defaults_to_pretty() {
        std::env::set_var("REPOLINK_LOG_FORMAT", "bogus");
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
        std::env::set_var("REPOLINK_LOG_FORMAT", "json");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
        std::env::remove_var("REPOLINK_LOG_FORMAT");
    }

    #[test]
    fn test_init_is_idempotent() {
        let first = init_tracing(LogFormat::Pretty);
        assert_eq!(init_tracing(LogFormat::Json), first);
    }
}
