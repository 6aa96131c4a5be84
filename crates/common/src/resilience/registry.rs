//! Keyed registry of circuit breakers
//!
//! One breaker per upstream identity (typically `host:port`), created lazily
//! from a shared configuration and kept for the registry's lifetime.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, Clock, ConfigResult, SystemClock,
};

/// Registry handing out shared breakers by upstream identity
pub struct CircuitBreakerRegistry<C: Clock + Clone = SystemClock> {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
    clock: C,
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Create a registry using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> CircuitBreakerRegistry<C> {
    /// Create a registry whose breakers share `clock`
    ///
    /// The configuration is validated once here, so lazily created breakers
    /// cannot fail construction.
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, breakers: DashMap::new(), clock })
    }

    /// Get the breaker for `name`, creating it on first use
    pub fn get_or_create(&self, name: &str) -> ConfigResult<Arc<CircuitBreaker<C>>> {
        if let Some(existing) = self.breakers.get(name) {
            return Ok(Arc::clone(existing.value()));
        }

        let entry = self.breakers.entry(name.to_string());
        let breaker = match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let breaker = Arc::new(
                    CircuitBreaker::with_clock(self.config.clone(), self.clock.clone())?
                        .with_name(name),
                );
                debug!(breaker = name, "registered circuit breaker");
                Arc::clone(vacant.insert(breaker).value())
            }
        };
        Ok(breaker)
    }

    /// Get an existing breaker without creating one
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker<C>>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Force every registered breaker CLOSED
    pub fn reset_all(&self) {
        for entry in &self.breakers {
            entry.value().reset();
        }
    }

    /// Metrics for every registered breaker, sorted by name
    pub fn snapshot(&self) -> Vec<CircuitBreakerMetrics> {
        let mut metrics: Vec<_> = self.breakers.iter().map(|entry| entry.value().metrics()).collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }

    /// Number of registered breakers
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breaker has been created yet
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl<C: Clock + Clone> std::fmt::Debug for CircuitBreakerRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resilience::{CircuitState, MockClock};

    fn registry() -> CircuitBreakerRegistry<MockClock> {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(30),
            monitoring_window: Duration::from_secs(60),
        };
        CircuitBreakerRegistry::with_clock(config, MockClock::new()).unwrap()
    }

    /// Validates lazy creation and reuse.
    ///
    /// Assertions:
    /// - Confirms the same identity yields the same breaker instance.
    /// - Confirms distinct identities are isolated.
    #[test]
    fn test_get_or_create_reuses_instances() {
        let registry = registry();
        assert!(registry.is_empty());

        let a1 = registry.get_or_create("a:443").unwrap();
        let a2 = registry.get_or_create("a:443").unwrap();
        let b = registry.get_or_create("b:80").unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(a1.name(), "a:443");
        assert_eq!(registry.len(), 2);

        a1.record_failure();
        assert_eq!(a2.state(), CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = registry();
        assert!(registry.get("missing:1").is_none());
        assert!(registry.is_empty());
    }

    /// Validates `reset_all` and `snapshot`.
    ///
    /// Assertions:
    /// - Confirms every breaker returns to CLOSED.
    /// - Confirms snapshots are sorted by name.
    #[test]
    fn test_reset_all_and_snapshot() {
        let registry = registry();
        registry.get_or_create("z:1").unwrap().record_failure();
        registry.get_or_create("a:1").unwrap().record_failure();

        let names: Vec<_> = registry.snapshot().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a:1".to_string(), "z:1".to_string()]);

        registry.reset_all();
        assert!(registry.snapshot().iter().all(|m| m.state == CircuitState::Closed));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = CircuitBreakerConfig { failure_threshold: 0, ..Default::default() };
        assert!(CircuitBreakerRegistry::new(config).is_err());
    }
}
