//! Client defaults
//!
//! Centralized location for the default values used when a configuration
//! section or a per-call option is omitted.

// Transport
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_PATH: &str = "/system/health";
pub const DEFAULT_USER_AGENT: &str = concat!("repolink/", env!("CARGO_PKG_VERSION"));

// Retry schedule
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

// Circuit breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MONITORING_WINDOW_MS: u64 = 120_000;

// Cache
pub const DEFAULT_CACHE_MAX_SIZE: usize = 1_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

// Credentials
pub const AUTH_FAILURE_COOLDOWN_MS: u64 = 60_000;
pub const DEFAULT_JWT_EXCHANGE_PATH: &str = "/ims/exchange/jwt";
pub const DEFAULT_ASSERTION_TTL_SECS: u64 = 86_400;

/// Marker substituted for secret values in logs, envelopes, and `Debug`.
pub const REDACTION_MARKER: &str = "[REDACTED]";
