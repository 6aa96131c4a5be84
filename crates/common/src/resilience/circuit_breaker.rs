//! Circuit breaker for isolating an unhealthy upstream
//!
//! A breaker starts CLOSED and counts consecutive failures inside a
//! monitoring window. Reaching the threshold opens it for the recovery
//! timeout, during which every call is rejected without being attempted.
//! After that a single trial call is let through (HALF_OPEN): success closes
//! the breaker, failure reopens it for another recovery timeout.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward by
/// hand so timeout-based transitions can be asserted without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so advancing one handle moves time
/// for every component holding a clone.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Configuration validation error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors produced by breaker-protected execution
///
/// Generic over the operation error so the original failure is preserved
/// untouched in `OperationFailed`.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker rejected the call without attempting it
    #[error("Circuit breaker '{name}' is open, rejecting calls")]
    CircuitOpen {
        /// Upstream identity of the rejecting breaker
        name: String,
        /// Time until the breaker will admit a trial call
        retry_after: Duration,
    },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Unwrap the operation error, or map a rejection through `on_open`
    pub fn into_inner_or(self, on_open: impl FnOnce(String, Duration) -> E) -> E {
        match self {
            Self::CircuitOpen { name, retry_after } => on_open(name, retry_after),
            Self::OperationFailed { source } => source,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow through normally
    Closed,
    /// Calls are rejected until the recovery timeout elapses
    Open,
    /// A single trial call is probing the upstream
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (within the window) that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call
    pub recovery_timeout: Duration,
    /// Failure runs older than this restart the count
    pub monitoring_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_secs(120),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.monitoring_window.is_zero() {
            return Err(ConfigError::Invalid {
                message: "monitoring_window must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn monitoring_window(mut self, window: Duration) -> Self {
        self.config.monitoring_window = window;
        self
    }

    /// Set a custom clock for the circuit breaker (useful for testing)
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock, name: None }
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder with custom clock that builds a CircuitBreaker directly
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
    name: Option<String>,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn monitoring_window(mut self, window: Duration) -> Self {
        self.config.monitoring_window = window;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        let breaker = CircuitBreaker::with_clock(self.config, self.clock)?;
        Ok(match self.name {
            Some(name) => breaker.with_name(name),
            None => breaker,
        })
    }
}

//==============================================================================
// Breaker
//==============================================================================

/// Serializable snapshot of breaker state and counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    /// Current consecutive-failure count
    pub failure_count: u32,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Calls rejected without being attempted
    pub rejected_calls: u64,
    /// Remaining open time, present only while OPEN
    pub time_until_half_open_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    consecutive_failures: u32,
    window_start: Option<Instant>,
    last_failure: Option<Instant>,
    open_until: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerCore {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            window_start: None,
            last_failure: None,
            open_until: None,
            trial_in_flight: false,
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejected: AtomicU64,
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Releases the half-open trial slot if the trial future is dropped before
/// it reports an outcome.
struct TrialGuard<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    armed: bool,
}

impl<C: Clock> Drop for TrialGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let mut core = self.breaker.core.lock();
            if core.state == CircuitState::HalfOpen {
                core.trial_in_flight = false;
            }
        }
    }
}

/// Circuit breaker for one upstream identity
///
/// Rejections caused by the breaker itself never count as failures.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    core: Mutex<BreakerCore>,
    totals: Totals,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &core.state)
            .field("failure_count", &core.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self {
            name: "default".to_string(),
            config,
            core: Mutex::new(BreakerCore::closed()),
            totals: Totals::default(),
            clock,
        })
    }

    /// Attach the upstream identity used in logs, errors, and metrics
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Upstream identity of this breaker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Every `Err` counts as a failure. Use [`Self::execute_classified`] when
    /// only some errors indicate an unhealthy upstream.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_classified(operation, |_| true).await
    }

    /// Execute an operation, counting only errors for which `is_failure`
    /// returns true
    ///
    /// Errors that are not failures are recorded as a healthy response and
    /// still returned to the caller unchanged.
    #[instrument(skip_all, fields(breaker = %self.name))]
    pub async fn execute_classified<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        let admission = match self.try_acquire() {
            Ok(admission) => admission,
            Err(retry_after) => {
                self.totals.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(retry_after_ms = retry_after.as_millis() as u64, "circuit breaker rejected call");
                return Err(ResilienceError::CircuitOpen { name: self.name.clone(), retry_after });
            }
        };

        self.totals.calls.fetch_add(1, Ordering::Relaxed);
        let mut guard = TrialGuard { breaker: self, armed: admission == Admission::Trial };

        let result = operation().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.on_success(admission);
                Ok(value)
            }
            Err(error) => {
                if is_failure(&error) {
                    self.on_failure(admission);
                } else {
                    self.on_success(admission);
                }
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Check whether a call would currently be admitted, without claiming the
    /// half-open trial slot
    pub fn can_execute(&self) -> bool {
        let now = self.clock.now();
        let core = self.core.lock();
        match core.state {
            CircuitState::Closed => true,
            CircuitState::Open => core.open_until.is_some_and(|until| now >= until),
            CircuitState::HalfOpen => !core.trial_in_flight,
        }
    }

    fn try_acquire(&self) -> Result<Admission, Duration> {
        let now = self.clock.now();
        let mut core = self.core.lock();

        match core.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let until = core.open_until.unwrap_or(now);
                if now >= until {
                    core.state = CircuitState::HalfOpen;
                    core.trial_in_flight = true;
                    info!(breaker = %self.name, "circuit breaker half-open, admitting trial call");
                    Ok(Admission::Trial)
                } else {
                    Err(until - now)
                }
            }
            CircuitState::HalfOpen => {
                if core.trial_in_flight {
                    Err(Duration::ZERO)
                } else {
                    core.trial_in_flight = true;
                    Ok(Admission::Trial)
                }
            }
        }
    }

    /// Record a successful call made outside the half-open trial
    ///
    /// While HALF_OPEN only the admitted trial may close the breaker, so an
    /// outcome recorded here is counted but leaves the state unchanged.
    pub fn record_success(&self) {
        self.on_success(Admission::Normal);
    }

    /// Record a failed call made outside the half-open trial
    pub fn record_failure(&self) {
        self.on_failure(Admission::Normal);
    }

    fn on_success(&self, admission: Admission) {
        self.totals.successes.fetch_add(1, Ordering::Relaxed);
        let mut core = self.core.lock();

        match (core.state, admission) {
            (CircuitState::Closed, _) => {
                core.consecutive_failures = 0;
                core.window_start = None;
            }
            (CircuitState::HalfOpen, Admission::Trial) => {
                *core = BreakerCore::closed();
                info!(breaker = %self.name, "circuit breaker closed after successful trial");
            }
            (CircuitState::HalfOpen, Admission::Normal) => {
                debug!(breaker = %self.name, "late success ignored while trial in flight");
            }
            // Admitted before the trip and finished late
            (CircuitState::Open, _) => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        self.totals.failures.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.last_failure = Some(now);

        match core.state {
            CircuitState::Closed => {
                let window_expired = core
                    .window_start
                    .is_some_and(|start| now.duration_since(start) > self.config.monitoring_window);
                if window_expired || core.consecutive_failures == 0 {
                    core.consecutive_failures = 0;
                    core.window_start = Some(now);
                }

                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold {
                    core.state = CircuitState::Open;
                    core.open_until = Some(now + self.config.recovery_timeout);
                    warn!(
                        breaker = %self.name,
                        failures = core.consecutive_failures,
                        recovery_ms = self.config.recovery_timeout.as_millis() as u64,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen if admission == Admission::Trial => {
                core.state = CircuitState::Open;
                core.trial_in_flight = false;
                core.open_until = Some(now + self.config.recovery_timeout);
                warn!(breaker = %self.name, "circuit breaker reopened after failed trial");
            }
            CircuitState::HalfOpen => {
                debug!(breaker = %self.name, "late failure ignored while trial in flight");
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current state of the circuit breaker
    ///
    /// An OPEN breaker whose recovery timeout has elapsed still reports OPEN
    /// until the next call claims the trial slot.
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.core.lock().consecutive_failures
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now();
        let core = self.core.lock();
        let time_until_half_open_ms = match (core.state, core.open_until) {
            (CircuitState::Open, Some(until)) => {
                Some(until.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };

        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: core.state,
            failure_count: core.consecutive_failures,
            total_calls: self.totals.calls.load(Ordering::Relaxed),
            total_successes: self.totals.successes.load(Ordering::Relaxed),
            total_failures: self.totals.failures.load(Ordering::Relaxed),
            rejected_calls: self.totals.rejected.load(Ordering::Relaxed),
            time_until_half_open_ms,
        }
    }

    /// Force the breaker CLOSED with a zeroed failure count
    pub fn reset(&self) {
        *self.core.lock() = BreakerCore::closed();
        info!(breaker = %self.name, "circuit breaker manually reset to closed state");
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for circuit breaker state transitions, configuration
    //! validation, and the clock abstraction.

    use std::sync::atomic::AtomicU32;

    use super::*;

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("boom")]
    struct Boom;

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("not found")]
    struct NotFound;

    fn breaker(threshold: u32, recovery_ms: u64) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::builder()
            .failure_threshold(threshold)
            .recovery_timeout(Duration::from_millis(recovery_ms))
            .monitoring_window(Duration::from_secs(60))
            .clock(clock.clone())
            .name("repo.example.com:443")
            .build()
            .unwrap();
        (breaker, clock)
    }

    async fn fail(breaker: &CircuitBreaker<MockClock>) -> ResilienceResult<(), Boom> {
        breaker.execute(|| async { Err::<(), _>(Boom) }).await
    }

    async fn succeed(breaker: &CircuitBreaker<MockClock>) -> ResilienceResult<u8, Boom> {
        breaker.execute(|| async { Ok::<_, Boom>(7) }).await
    }

    // =========================================================================
    // Clock Tests
    // =========================================================================

    /// Validates the mock clock advance scenario.
    ///
    /// Assertions:
    /// - Confirms `now()` moves by exactly the advanced amount.
    /// - Confirms clones observe the same time.
    #[test]
    fn test_mock_clock_advance_shared() {
        let clock = MockClock::new();
        let clone = clock.clone();
        let start = clock.now();

        clone.advance_millis(1500);
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(1500));
        assert_eq!(clock.millis_since_epoch(), 1500);

        clock.set_elapsed(Duration::from_secs(10));
        assert_eq!(clone.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"HALF_OPEN\"");
    }

    // =========================================================================
    // Configuration Tests
    // =========================================================================

    /// Validates configuration validation.
    ///
    /// Assertions:
    /// - Ensures a zero threshold is rejected.
    /// - Ensures a zero monitoring window is rejected.
    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
        assert!(CircuitBreakerConfig::builder().failure_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().monitoring_window(Duration::ZERO).build().is_err());
        assert!(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        })
        .is_err());
    }

    // =========================================================================
    // State Transition Tests
    // =========================================================================

    /// Validates the trip to OPEN.
    ///
    /// Assertions:
    /// - Confirms the breaker opens after `failure_threshold` failures.
    /// - Confirms an open breaker rejects without invoking the operation.
    /// - Confirms rejections are not counted as failures.
    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let (breaker, _clock) = breaker(3, 1000);

        for _ in 0..3 {
            assert!(matches!(fail(&breaker).await, Err(ResilienceError::OperationFailed { .. })));
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Boom>(())
            })
            .await;

        match result {
            Err(ResilienceError::CircuitOpen { name, retry_after }) => {
                assert_eq!(name, "repo.example.com:443");
                assert_eq!(retry_after, Duration::from_millis(1000));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        let metrics = breaker.metrics();
        assert_eq!(metrics.total_failures, 3);
        assert_eq!(metrics.rejected_calls, 1);
        assert_eq!(metrics.failure_count, 3);
        assert_eq!(metrics.time_until_half_open_ms, Some(1000));
    }

    /// Validates recovery through HALF_OPEN.
    ///
    /// Assertions:
    /// - Confirms one trial is admitted once the recovery timeout elapses.
    /// - Confirms a successful trial closes the breaker with zero failures.
    #[tokio::test]
    async fn test_half_open_success_closes() {
        let (breaker, clock) = breaker(2, 500);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance_millis(499);
        assert!(!breaker.can_execute());
        assert!(matches!(succeed(&breaker).await, Err(ResilienceError::CircuitOpen { .. })));

        clock.advance_millis(1);
        assert!(breaker.can_execute());
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    /// Validates a failed trial.
    ///
    /// Assertions:
    /// - Confirms the breaker reopens with a fresh recovery timeout.
    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (breaker, clock) = breaker(1, 200);
        let _ = fail(&breaker).await;
        clock.advance_millis(250);

        assert!(matches!(fail(&breaker).await, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().time_until_half_open_ms, Some(200));

        clock.advance_millis(199);
        assert!(matches!(succeed(&breaker).await, Err(ResilienceError::CircuitOpen { .. })));
    }

    /// Validates that only one trial runs at a time.
    ///
    /// Assertions:
    /// - Confirms a second call during the trial is rejected.
    /// - Confirms a dropped trial releases the slot.
    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        let (breaker, clock) = breaker(1, 100);
        let _ = fail(&breaker).await;
        clock.advance_millis(100);

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.execute(|| async move {
            let _ = release_rx.await;
            Ok::<_, Boom>(1)
        });
        tokio::pin!(trial);

        // Poll the trial once so it claims the slot
        assert!(futures::poll!(trial.as_mut()).is_pending());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(matches!(succeed(&breaker).await, Err(ResilienceError::CircuitOpen { .. })));

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);

        // A trial future dropped mid-flight frees the slot for the next caller
        let _ = fail(&breaker).await;
        clock.advance_millis(100);
        {
            let pending = breaker.execute(|| futures::future::pending::<Result<(), Boom>>());
            tokio::pin!(pending);
            assert!(futures::poll!(pending.as_mut()).is_pending());
        }
        assert!(breaker.can_execute());
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
    }

    /// Validates that only the trial decides the half-open outcome.
    ///
    /// Assertions:
    /// - Confirms a call admitted while CLOSED that finishes during the trial
    ///   leaves the breaker HALF_OPEN and still rejecting.
    /// - Confirms the trial's failure reopens the breaker afterwards.
    #[tokio::test]
    async fn test_late_outcome_does_not_resolve_trial() {
        let (breaker, clock) = breaker(2, 100);

        let (late_tx, late_rx) = tokio::sync::oneshot::channel::<()>();
        let late = breaker.execute(|| async move {
            let _ = late_rx.await;
            Ok::<_, Boom>(1)
        });
        tokio::pin!(late);
        assert!(futures::poll!(late.as_mut()).is_pending());

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        clock.advance_millis(100);

        let (trial_tx, trial_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.execute(|| async move {
            let _ = trial_rx.await;
            Err::<u8, _>(Boom)
        });
        tokio::pin!(trial);
        assert!(futures::poll!(trial.as_mut()).is_pending());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        late_tx.send(()).unwrap();
        assert_eq!(late.await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(matches!(succeed(&breaker).await, Err(ResilienceError::CircuitOpen { .. })));

        trial_tx.send(()).unwrap();
        assert!(trial.await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.metrics().time_until_half_open_ms.is_some());
    }

    /// Validates the monitoring window.
    ///
    /// Assertions:
    /// - Confirms failures older than the window restart the count.
    #[tokio::test]
    async fn test_failures_outside_window_restart_count() {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::builder()
            .failure_threshold(3)
            .monitoring_window(Duration::from_secs(10))
            .clock(clock.clone())
            .build()
            .unwrap();

        let _ = breaker.execute(|| async { Err::<(), _>(Boom) }).await;
        let _ = breaker.execute(|| async { Err::<(), _>(Boom) }).await;
        clock.advance(Duration::from_secs(11));
        let _ = breaker.execute(|| async { Err::<(), _>(Boom) }).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let (breaker, _clock) = breaker(3, 1000);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = succeed(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 2);
    }

    /// Validates classified execution.
    ///
    /// Assertions:
    /// - Confirms errors classified as healthy do not trip the breaker.
    /// - Confirms the original error is still returned.
    #[tokio::test]
    async fn test_execute_classified_ignores_non_failures() {
        let (breaker, _clock) = breaker(1, 1000);

        let result = breaker.execute_classified(|| async { Err::<(), _>(NotFound) }, |_| false).await;
        match result {
            Err(ResilienceError::OperationFailed { source }) => assert_eq!(source, NotFound),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().total_successes, 1);
    }

    #[tokio::test]
    async fn test_reset_forces_closed() {
        let (breaker, _clock) = breaker(1, 60_000);
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
    }

    #[test]
    fn test_into_inner_or_maps_rejection() {
        let open: ResilienceError<Boom> =
            ResilienceError::CircuitOpen { name: "x".into(), retry_after: Duration::ZERO };
        assert_eq!(open.into_inner_or(|_, _| Boom), Boom);

        let failed: ResilienceError<Boom> = ResilienceError::OperationFailed { source: Boom };
        assert_eq!(failed.into_inner_or(|_, _| unreachable!()), Boom);
    }
}
