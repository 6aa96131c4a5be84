//! Construction of [`RepositoryClient`]
//!
//! Every collaborator can be injected; anything left unset is built from the
//! [`ClientConfig`].

use std::sync::Arc;
use std::time::Duration;

use repolink_common::cache::{Cache, CacheConfig, EvictionPolicy};
use repolink_common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry, RetryConfig};
use repolink_domain::{CacheSettings, ClientConfig, EvictionStrategy, RepoLinkError, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::stats::PerformanceStats;
use super::{RepositoryClient, ResponseCache};
use crate::auth::{provider_from_config, CredentialProvider};
use crate::http::HttpClient;
use crate::normalizer::ResponseNormalizer;

/// Builder for [`RepositoryClient`].
#[derive(Default)]
pub struct RepositoryClientBuilder {
    config: Option<ClientConfig>,
    http: Option<HttpClient>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    cache: Option<ResponseCache>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
}

impl RepositoryClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use `cache` instead of one built from `config.cache`. The cache may be
    /// shared with other clients.
    pub fn cache(mut self, cache: Cache<String, Value>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share breakers with other clients talking to the same upstreams.
    pub fn breaker_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    /// # Errors
    /// Returns `RepoLinkError::Config` when no configuration was supplied or
    /// it fails validation, and `RepoLinkError::Auth` when credential
    /// material cannot be loaded.
    pub fn build(self) -> Result<RepositoryClient> {
        let config =
            self.config.ok_or_else(|| RepoLinkError::Config("client configuration is required".into()))?;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::for_config(&config)?,
        };

        let credentials = match self.credentials {
            Some(credentials) => credentials,
            None => provider_from_config(&config.auth, &http, config.timeout())?,
        };

        let cache = match self.cache {
            Some(cache) => Some(cache),
            None if config.cache.enabled => Some(Cache::new(cache_config(&config.cache))),
            None => None,
        };

        let breakers = match self.breakers {
            Some(registry) => registry,
            None => Arc::new(
                CircuitBreakerRegistry::new(breaker_config(&config)?)
                    .map_err(|e| RepoLinkError::Config(e.to_string()))?,
            ),
        };
        let breaker_name = config.upstream.identity();
        let breaker =
            breakers.get_or_create(&breaker_name).map_err(|e| RepoLinkError::Config(e.to_string()))?;

        let retry = RetryConfig::builder()
            .max_attempts(config.retry.max_attempts)
            .base_delay(Duration::from_millis(config.retry.base_delay_ms))
            .max_delay(Duration::from_millis(config.retry.max_delay_ms))
            .multiplier(config.retry.multiplier)
            .build()
            .map_err(|e| RepoLinkError::Config(e.to_string()))?;

        info!(
            upstream = %breaker_name,
            auth = %credentials.scheme(),
            cache = cache.is_some(),
            max_attempts = retry.max_attempts,
            "repository client ready"
        );

        Ok(RepositoryClient {
            base_url: Arc::from(config.upstream.base_url()),
            config: Arc::new(config),
            http,
            credentials,
            cache,
            breaker,
            retry,
            normalizer: ResponseNormalizer::new(),
            stats: Arc::new(PerformanceStats::new()),
            shutdown: CancellationToken::new(),
        })
    }
}

fn cache_config(settings: &CacheSettings) -> CacheConfig {
    let policy = match settings.eviction {
        EvictionStrategy::Lru => EvictionPolicy::Lru,
        EvictionStrategy::Lfu => EvictionPolicy::Lfu,
    };
    let builder = CacheConfig::builder().max_size(settings.max_size).eviction_policy(policy);
    if settings.default_ttl_ms == 0 {
        builder.no_expiry().build()
    } else {
        builder.default_ttl(Duration::from_millis(settings.default_ttl_ms)).build()
    }
}

fn breaker_config(config: &ClientConfig) -> Result<CircuitBreakerConfig> {
    CircuitBreakerConfig::builder()
        .failure_threshold(config.circuit_breaker.failure_threshold)
        .recovery_timeout(Duration::from_millis(config.circuit_breaker.recovery_timeout_ms))
        .monitoring_window(Duration::from_millis(config.circuit_breaker.monitoring_window_ms))
        .build()
        .map_err(|e| RepoLinkError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use repolink_domain::{AuthConfig, Secret, UpstreamConfig};

    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(
            UpstreamConfig::new("author.example.com"),
            AuthConfig::Basic { username: "admin".into(), password: Secret::new("admin") },
        )
    }

    #[test]
    fn test_build_requires_config() {
        let err = RepositoryClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, RepoLinkError::Config(_)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.retry.max_attempts = 0;
        assert!(RepositoryClient::builder().config(config).build().is_err());
    }

    #[test]
    fn test_disabled_cache_is_not_built() {
        let mut config = config();
        config.cache.enabled = false;
        let client = RepositoryClient::builder().config(config).build().unwrap();
        assert!(client.stats().cache.is_none());
    }

    #[test]
    fn test_shared_registry_registers_upstream() {
        let registry = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()).unwrap());
        let _client = RepositoryClient::builder()
            .config(config())
            .breaker_registry(Arc::clone(&registry))
            .build()
            .unwrap();
        assert!(registry.get("author.example.com:443").is_some());
    }

    #[test]
    fn test_cache_settings_map_to_policy() {
        let settings = CacheSettings {
            enabled: true,
            max_size: 10,
            default_ttl_ms: 0,
            eviction: EvictionStrategy::Lfu,
        };
        let config = cache_config(&settings);
        assert_eq!(config.max_size, Some(10));
        assert_eq!(config.default_ttl, None);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lfu);
    }
}
