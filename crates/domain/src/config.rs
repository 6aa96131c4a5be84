//! Client configuration
//!
//! Serde-friendly structures loaded from environment variables or files by
//! the infrastructure crate. Durations are stored as milliseconds so the
//! same shape works in TOML, JSON, and the environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::*;
use crate::errors::{RepoLinkError, Result};
use crate::impl_domain_status_conversions;

/// String that never prints its contents.
///
/// `Debug`, `Display`, and `Serialize` all emit the redaction marker; read
/// the value explicitly with [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MARKER)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MARKER)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTION_MARKER)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// Upstream scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl_domain_status_conversions!(Protocol {
    Http => "http",
    Https => "https",
});

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Cache eviction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    #[default]
    Lru,
    Lfu,
}

impl_domain_status_conversions!(EvictionStrategy {
    Lru => "lru",
    Lfu => "lfu",
});

/// Where requests go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
    /// Prefix prepended to every request path, e.g. `/api`.
    #[serde(default)]
    pub base_path: String,
}

impl UpstreamConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), port: None, protocol: Protocol::default(), base_path: String::new() }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Circuit breaker identity for this upstream.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// `protocol://host[:port]base_path`, omitting the port when it is the
    /// protocol default.
    pub fn base_url(&self) -> String {
        let base_path = self.base_path.trim_end_matches('/');
        match self.port {
            Some(port) if port != self.protocol.default_port() => {
                format!("{}://{}:{}{}", self.protocol, self.host, port, base_path)
            }
            _ => format!("{}://{}{}", self.protocol, self.host, base_path),
        }
    }
}

/// Retry schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub monitoring_window_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_ms: DEFAULT_RECOVERY_TIMEOUT_MS,
            monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
        }
    }
}

/// Response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_size: usize,
    pub default_ttl_ms: u64,
    pub eviction: EvictionStrategy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_CACHE_MAX_SIZE,
            default_ttl_ms: DEFAULT_CACHE_TTL_MS,
            eviction: EvictionStrategy::default(),
        }
    }
}

/// Credential scheme and its material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Basic {
        username: String,
        password: Secret,
    },
    /// Client-credentials grant against a fixed token endpoint.
    Oauth {
        client_id: String,
        client_secret: Secret,
        token_url: String,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default)]
        refresh_threshold_ms: u64,
    },
    /// Signed JWT assertion exchanged for an access token.
    ServiceAccount {
        client_id: String,
        client_secret: Secret,
        technical_account_id: String,
        org_id: String,
        /// RSA private key, PEM encoded.
        private_key: Secret,
        /// Identity service base URL, e.g. `https://ims-na1.example.com`.
        ims_endpoint: String,
        #[serde(default)]
        metascopes: Vec<String>,
        #[serde(default = "default_exchange_path")]
        exchange_path: String,
        #[serde(default = "default_assertion_ttl_secs")]
        assertion_ttl_secs: u64,
        #[serde(default)]
        refresh_threshold_ms: u64,
    },
}

fn default_exchange_path() -> String {
    DEFAULT_JWT_EXCHANGE_PATH.to_string()
}

fn default_assertion_ttl_secs() -> u64 {
    DEFAULT_ASSERTION_TTL_SECS
}

impl AuthConfig {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Oauth { .. } => "oauth",
            Self::ServiceAccount { .. } => "service-account",
        }
    }

    fn validate(&self) -> Result<()> {
        let require = |value: &str, field: &str| {
            if value.trim().is_empty() {
                Err(RepoLinkError::Config(format!("{} auth requires {field}", self.scheme())))
            } else {
                Ok(())
            }
        };

        match self {
            Self::Basic { username, .. } => require(username, "username"),
            Self::Oauth { client_id, client_secret, token_url, .. } => {
                require(client_id, "client_id")?;
                require(client_secret.expose(), "client_secret")?;
                require(token_url, "token_url")
            }
            Self::ServiceAccount {
                client_id,
                client_secret,
                technical_account_id,
                org_id,
                private_key,
                ims_endpoint,
                assertion_ttl_secs,
                ..
            } => {
                require(client_id, "client_id")?;
                require(client_secret.expose(), "client_secret")?;
                require(technical_account_id, "technical_account_id")?;
                require(org_id, "org_id")?;
                require(private_key.expose(), "private_key")?;
                require(ims_endpoint, "ims_endpoint")?;
                if *assertion_ttl_secs == 0 {
                    return Err(RepoLinkError::Config(
                        "service-account auth requires assertion_ttl_secs > 0".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ClientConfig {
    /// Configuration with default resilience settings.
    pub fn new(upstream: UpstreamConfig, auth: AuthConfig) -> Self {
        Self {
            upstream,
            auth,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            cache: CacheSettings::default(),
            health_path: default_health_path(),
            user_agent: default_user_agent(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject configurations the client cannot run with.
    ///
    /// # Errors
    /// Returns `RepoLinkError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.host.trim().is_empty() {
            return Err(RepoLinkError::Config("upstream.host must not be empty".into()));
        }
        if self.upstream.port == Some(0) {
            return Err(RepoLinkError::Config("upstream.port must be non-zero".into()));
        }
        if self.timeout_ms == 0 {
            return Err(RepoLinkError::Config("timeout_ms must be greater than 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RepoLinkError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(RepoLinkError::Config("retry.multiplier must be >= 1.0".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(RepoLinkError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(RepoLinkError::Config(
                "circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.circuit_breaker.recovery_timeout_ms == 0 {
            return Err(RepoLinkError::Config(
                "circuit_breaker.recovery_timeout_ms must be greater than 0".into(),
            ));
        }
        if !self.health_path.starts_with('/') {
            return Err(RepoLinkError::Config("health_path must start with '/'".into()));
        }
        self.auth.validate()
    }
}
