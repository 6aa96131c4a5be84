//! Resilience patterns for fault tolerance
//!
//! - **Circuit Breaker**: stops calling an upstream that keeps failing and
//!   probes it again after a recovery timeout
//! - **Registry**: one breaker per upstream identity, created on demand
//! - **Retry**: bounded attempts with capped exponential backoff and a
//!   pluggable policy deciding which errors are worth another try
//!
//! Everything here is generic over the operation error type and takes a
//! [`Clock`] so timing-dependent behavior can be tested with [`MockClock`].

pub mod circuit_breaker;
pub mod registry;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, Clock, ConfigError,
    ConfigResult, MockClock, ResilienceError, ResilienceResult, SystemClock,
};
pub use registry::CircuitBreakerRegistry;
// Re-export retry types
pub use retry::{
    policies, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryOutcome, RetryPolicy,
};
