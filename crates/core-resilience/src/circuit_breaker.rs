//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! dependency is experiencing issues. It has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Dependency is unhealthy, requests fail immediately
//! - HalfOpen: Testing if the dependency has recovered, one probe at a time
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive qualifying failures reach failure_threshold
//! Open     → HalfOpen: recovery_timeout elapsed since the last state change
//! HalfOpen → Closed:   consecutive probe successes reach success_threshold
//! HalfOpen → Open:     any qualifying probe failure
//! any      → Closed:   reset()
//! any      → Open:     force_open()
//! ```
//!
//! Admission and outcome accounting each run under the breaker's lock; the
//! lock is never held while the operation itself runs. Every transition bumps
//! an epoch, and outcomes of calls admitted under an older epoch only reach
//! the metrics, never the state machine.

use crate::classifier::{Classify, FailureClassifier};
use crate::clock::{Clock, SystemClock};
use crate::error::{BreakerError, ResilienceError};
use crate::metrics::{CallOutcome, MetricsRecorder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, a single probe tests recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,
    /// Duration the circuit stays open before a probe is admitted
    pub recovery_timeout: Duration,
    /// Number of consecutive successes in half-open to close circuit
    pub success_threshold: u32,
    /// Upper bound on a single guarded call
    pub call_timeout: Duration,
    /// Which operation errors count against the breaker
    pub classifier: FailureClassifier,
    /// Whether callers should serve a fallback when the call fails
    pub fallback_enabled: bool,
    /// Size of the rolling window behind the recent failure rate
    pub metrics_window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            call_timeout: Duration::from_secs(10),
            classifier: FailureClassifier::default(),
            fallback_enabled: true,
            metrics_window_size: 100,
        }
    }
}

impl CircuitBreakerConfig {
    /// Reject configurations the state machine cannot honor
    pub fn validate(&self) -> Result<(), ResilienceError> {
        if self.failure_threshold == 0 {
            return Err(ResilienceError::InvalidConfig(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(ResilienceError::InvalidConfig(
                "success_threshold must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ResilienceError::InvalidConfig(
                "call_timeout must be greater than zero".to_string(),
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(ResilienceError::InvalidConfig(
                "recovery_timeout must be greater than zero".to_string(),
            ));
        }
        if self.metrics_window_size == 0 {
            return Err(ResilienceError::InvalidConfig(
                "metrics_window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Side-effect-free view of a breaker's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_state_change_at: DateTime<Utc>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Internal state of the circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    /// Only meaningful in half-open
    consecutive_successes: u32,
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change_time: Instant,
    last_state_change_at: DateTime<Utc>,
    probe_in_flight: bool,
    epoch: u64,
}

/// How a call got past the breaker
#[derive(Debug, Clone, Copy)]
enum Admission {
    Normal { epoch: u64 },
    Probe { epoch: u64 },
}

impl Admission {
    fn epoch(self) -> u64 {
        match self {
            Admission::Normal { epoch } | Admission::Probe { epoch } => epoch,
        }
    }
}

/// Circuit breaker for protecting against cascading failures
///
/// Cloning is cheap and every clone drives the same state machine.
///
/// # Example
/// ```no_run
/// use riskguard_core_resilience::{BreakerError, CircuitBreaker, CircuitBreakerConfig};
/// use riskguard_core_resilience::classifier::{Classify, ErrorClass};
///
/// #[derive(Debug)]
/// struct Unreachable;
///
/// impl Classify for Unreachable {
///     fn error_class(&self) -> ErrorClass {
///         ErrorClass::Connection
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), BreakerError<Unreachable>> {
///     let breaker = CircuitBreaker::new("ml_model_service", CircuitBreakerConfig::default());
///
///     let score = breaker
///         .execute(|| async { Ok::<_, Unreachable>(0.42) })
///         .await?;
///
///     println!("Score: {}", score);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRecorder>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker backed by the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a new circuit breaker with an injected clock
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name: String = name.into();
        let metrics = Arc::new(MetricsRecorder::new(
            config.metrics_window_size,
            Arc::clone(&clock),
        ));
        let state = CircuitBreakerState {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            last_state_change_time: clock.now(),
            last_state_change_at: clock.wall_clock(),
            probe_in_flight: false,
            epoch: 0,
        };

        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            recovery_timeout = ?config.recovery_timeout,
            call_timeout = ?config.call_timeout,
            "Circuit breaker initialized"
        );

        Self {
            name: name.into(),
            config: Arc::new(config),
            clock,
            metrics,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Metrics recorder shared by every clone of this breaker
    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current status and counters
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    /// Force the breaker closed, clearing both counters and the last failure
    pub fn reset(&self) -> BreakerSnapshot {
        let mut state = self.lock();
        self.transition(&mut state, CircuitState::Closed);
        state.last_failure_at = None;
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset to CLOSED");
        self.snapshot_of(&state)
    }

    /// Force the breaker open and restart its recovery timer
    pub fn force_open(&self) -> BreakerSnapshot {
        let mut state = self.lock();
        self.transition(&mut state, CircuitState::Open);
        tracing::warn!(breaker = %self.name, "Circuit breaker manually forced to OPEN");
        self.snapshot_of(&state)
    }

    /// Execute an async operation under circuit breaker protection
    ///
    /// The operation is invoked at most once and bounded by `call_timeout`.
    /// Qualifying failures are recorded and returned; non-qualifying errors
    /// are returned without touching the breaker's counters.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let admission = self.admit()?;
        let mut guard = ProbeGuard::new(self, admission);

        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(self.config.call_timeout, op()).await;
        let latency = started.elapsed();
        guard.disarm();

        match outcome {
            Ok(Ok(value)) => {
                self.on_success(admission, latency);
                Ok(value)
            }
            Ok(Err(e)) if self.config.classifier.qualifies(&e) => {
                self.on_failure(admission, latency, &e.error_class().to_string());
                Err(BreakerError::Operation(e))
            }
            Ok(Err(e)) => {
                self.on_ignored(admission, latency);
                Err(BreakerError::Operation(e))
            }
            Err(_elapsed) => {
                self.on_failure(admission, latency, "call timeout");
                Err(BreakerError::Timeout {
                    name: self.name.to_string(),
                    timeout: self.config.call_timeout,
                })
            }
        }
    }

    /// Execute a blocking operation on tokio's blocking pool
    ///
    /// Same admission, timeout and accounting as [`execute`](Self::execute).
    /// A call that times out keeps running in the background; the breaker
    /// only records it as failed.
    pub async fn execute_blocking<F, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Classify + Send + 'static,
    {
        self.execute(|| async move {
            match tokio::task::spawn_blocking(op).await {
                Ok(result) => result,
                Err(join_err) => match join_err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // Cancelled only on runtime shutdown; the call timeout settles it
                    Err(_) => std::future::pending().await,
                },
            }
        })
        .await
    }

    /// Decide whether a call may proceed, transitioning Open → HalfOpen when due
    fn admit<E>(&self) -> Result<Admission, BreakerError<E>> {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => Ok(Admission::Normal { epoch: state.epoch }),
            CircuitState::Open => {
                let open_for = self
                    .clock
                    .now()
                    .saturating_duration_since(state.last_state_change_time);
                if open_for >= self.config.recovery_timeout {
                    self.transition(&mut state, CircuitState::HalfOpen);
                    state.probe_in_flight = true;
                    Ok(Admission::Probe { epoch: state.epoch })
                } else {
                    self.reject(&state)
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    self.reject(&state)
                } else {
                    state.probe_in_flight = true;
                    Ok(Admission::Probe { epoch: state.epoch })
                }
            }
        }
    }

    fn reject<E>(&self, state: &CircuitBreakerState) -> Result<Admission, BreakerError<E>> {
        self.metrics
            .record_call(CallOutcome::Rejected, Duration::ZERO, state.state);
        tracing::debug!(
            breaker = %self.name,
            state = %state.state,
            "Call rejected by open circuit"
        );
        Err(BreakerError::CircuitOpen {
            name: self.name.to_string(),
        })
    }

    /// Handle successful operation
    fn on_success(&self, admission: Admission, latency: Duration) {
        let mut state = self.lock();

        if admission.epoch() == state.epoch {
            match state.state {
                CircuitState::Closed => {
                    state.consecutive_failures = 0;
                }
                CircuitState::HalfOpen => {
                    state.probe_in_flight = false;
                    state.consecutive_successes += 1;
                    if state.consecutive_successes >= self.config.success_threshold {
                        self.transition(&mut state, CircuitState::Closed);
                    }
                }
                CircuitState::Open => {}
            }
        }

        self.metrics
            .record_call(CallOutcome::Success, latency, state.state);
    }

    /// Handle a qualifying failure (including the breaker's own timeout)
    fn on_failure(&self, admission: Admission, latency: Duration, cause: &str) {
        let mut state = self.lock();

        if admission.epoch() == state.epoch {
            match state.state {
                CircuitState::Closed => {
                    state.consecutive_failures += 1;
                    self.mark_failure(&mut state);
                    tracing::warn!(
                        breaker = %self.name,
                        cause,
                        failures = state.consecutive_failures,
                        "Circuit breaker recorded failure"
                    );
                    if state.consecutive_failures >= self.config.failure_threshold {
                        self.transition(&mut state, CircuitState::Open);
                    }
                }
                CircuitState::HalfOpen => {
                    self.mark_failure(&mut state);
                    tracing::warn!(breaker = %self.name, cause, "Recovery probe failed");
                    self.transition(&mut state, CircuitState::Open);
                }
                CircuitState::Open => {}
            }
        }

        self.metrics
            .record_call(CallOutcome::Failure, latency, state.state);
    }

    /// Handle an error the classifier does not count
    fn on_ignored(&self, admission: Admission, latency: Duration) {
        let mut state = self.lock();
        if let Admission::Probe { epoch } = admission {
            if epoch == state.epoch && state.state == CircuitState::HalfOpen {
                state.probe_in_flight = false;
            }
        }
        self.metrics.record_ignored(latency, state.state);
    }

    /// Free the probe slot of a call whose future was dropped mid-flight
    fn release_probe(&self, epoch: u64) {
        let mut state = self.lock();
        if epoch == state.epoch && state.state == CircuitState::HalfOpen {
            state.probe_in_flight = false;
            tracing::debug!(breaker = %self.name, "Abandoned probe released");
        }
    }

    fn mark_failure(&self, state: &mut CircuitBreakerState) {
        state.last_failure_at = Some(self.clock.wall_clock());
    }

    /// Move to `to`, resetting whatever the target state requires
    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        let from = state.state;
        let at = self.clock.wall_clock();

        state.state = to;
        state.epoch += 1;
        state.probe_in_flight = false;
        state.consecutive_successes = 0;
        state.last_state_change_time = self.clock.now();
        state.last_state_change_at = at;
        if to == CircuitState::Closed {
            state.consecutive_failures = 0;
        }

        self.metrics.record_transition(from, to, at);

        match (from, to) {
            (CircuitState::Closed, CircuitState::Open) => tracing::error!(
                breaker = %self.name,
                failures = state.consecutive_failures,
                "Circuit breaker OPENED"
            ),
            (_, CircuitState::Open) => tracing::warn!(
                breaker = %self.name,
                from = %from,
                "Circuit breaker returned to OPEN"
            ),
            (_, CircuitState::HalfOpen) => tracing::info!(
                breaker = %self.name,
                "Circuit breaker transitioning to HALF_OPEN for recovery test"
            ),
            (_, CircuitState::Closed) => {
                tracing::info!(breaker = %self.name, from = %from, "Circuit breaker CLOSED")
            }
        }
    }

    fn snapshot_of(&self, state: &CircuitBreakerState) -> BreakerSnapshot {
        BreakerSnapshot {
            name: self.name.to_string(),
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            last_state_change_at: state.last_state_change_at,
            last_failure_at: state.last_failure_at,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        // Every mutation completes before the guard drops, so a poisoned
        // lock still holds a consistent state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the half-open probe slot if the caller drops `execute` mid-call
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    epoch: Option<u64>,
}

impl<'a> ProbeGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, admission: Admission) -> Self {
        let epoch = match admission {
            Admission::Probe { epoch } => Some(epoch),
            Admission::Normal { .. } => None,
        };
        Self { breaker, epoch }
    }

    fn disarm(&mut self) {
        self.epoch = None;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Some(epoch) = self.epoch {
            self.breaker.release_probe(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorClass;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Transient,
        BadInput,
    }

    impl Classify for TestError {
        fn error_class(&self) -> ErrorClass {
            match self {
                TestError::Transient => ErrorClass::Unavailable,
                TestError::BadInput => ErrorClass::InvalidInput,
            }
        }
    }

    fn breaker(config: CircuitBreakerConfig) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::with_clock("test", config, Arc::new(clock.clone()));
        (breaker, clock)
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<TestError>> {
        breaker.execute(|| async { Err(TestError::Transient) }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<TestError>> {
        breaker.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_to_open() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        for expected in 1..=2 {
            assert_eq!(fail(&breaker).await, Err(BreakerError::Operation(TestError::Transient)));
            assert_eq!(breaker.state(), CircuitState::Closed);
            assert_eq!(breaker.snapshot().consecutive_failures, expected);
        }

        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().snapshot().circuit_open_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.snapshot().consecutive_failures, 0);

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_invoke_operation() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        let _ = fail(&breaker).await;

        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let result: Result<(), BreakerError<TestError>> = breaker
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert!(result.unwrap_err().is_circuit_open());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.metrics().snapshot().rejections, 5);
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_to_closed() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
            ..Default::default()
        });

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(29));
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());

        clock.advance(Duration::from_secs(1));
        succeed(&breaker).await.unwrap();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.consecutive_successes, 1);

        succeed(&breaker).await.unwrap();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_successes, 0);
        assert_eq!(snapshot.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(10),
            ..Default::default()
        });
        let _ = fail(&breaker).await;

        clock.advance(Duration::from_secs(10));
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let _ = fail(&breaker).await;
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.consecutive_successes, 0);
        assert!(snapshot.last_failure_at.is_some());

        // Recovery timer restarted from the reopen
        clock.advance(Duration::from_secs(5));
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());
    }

    #[tokio::test]
    async fn test_non_qualifying_error_propagates_without_counting() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        let result: Result<(), _> = breaker.execute(|| async { Err(TestError::BadInput) }).await;
        assert_eq!(result, Err(BreakerError::Operation(TestError::BadInput)));

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(breaker.metrics().snapshot().ignored_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        });

        let result: Result<(), BreakerError<TestError>> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(6)).await;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(breaker.state(), CircuitState::Open);
        let metrics = breaker.metrics().snapshot();
        assert_eq!(metrics.failures, 1);
        assert!(metrics.avg_latency >= Duration::from_secs(5));
    }

    // Real time: paused clocks do not auto-advance while a blocking task runs
    #[tokio::test]
    async fn test_blocking_timeout_counts_as_failure() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            call_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let result: Result<u8, BreakerError<TestError>> = breaker
            .execute_blocking(|| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(1)
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_blocking_success() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        let value: Result<u8, BreakerError<TestError>> =
            breaker.execute_blocking(|| Ok(7)).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_reset() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        let _ = fail(&breaker).await;

        let snapshot = breaker.reset();

        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.consecutive_successes, 0);
        assert!(snapshot.last_failure_at.is_none());
        succeed(&breaker).await.unwrap();
    }

    #[tokio::test]
    async fn test_force_open_restarts_recovery_timer() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            recovery_timeout: Duration::from_secs(30),
            ..Default::default()
        });

        clock.advance(Duration::from_secs(100));
        let snapshot = breaker.force_open();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.consecutive_successes, 0);

        clock.advance(Duration::from_secs(29));
        assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());
        clock.advance(Duration::from_secs(1));
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_snapshot_is_side_effect_free() {
        let (breaker, clock) = breaker(CircuitBreakerConfig::default());
        let _ = fail(&breaker).await;
        let first = breaker.snapshot();
        clock.advance(Duration::from_secs(5));
        assert_eq!(breaker.snapshot(), first);
        assert_eq!(breaker.snapshot(), first);
    }

    #[tokio::test]
    async fn test_dropped_probe_releases_slot() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(1));

        {
            let probe = breaker.execute(|| async {
                std::future::pending::<Result<(), TestError>>().await
            });
            // Poll once so the probe is admitted, then drop it
            let _ = tokio::time::timeout(Duration::from_millis(10), probe).await;
        }

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await.unwrap();
    }

    /// Admit a probe that blocks on `gate` and then returns `outcome`
    async fn parked_probe(
        breaker: &CircuitBreaker,
        gate: &Arc<Semaphore>,
        outcome: Result<(), TestError>,
    ) -> tokio::task::JoinHandle<Result<(), BreakerError<TestError>>> {
        let admitted = Arc::new(AtomicUsize::new(0));
        let handle = {
            let breaker = breaker.clone();
            let gate = Arc::clone(gate);
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                breaker
                    .execute(|| async move {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        let _permit = gate.acquire().await;
                        outcome
                    })
                    .await
            })
        };
        while admitted.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        handle
    }

    #[tokio::test]
    async fn test_probe_failure_after_reset_only_reaches_metrics() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(1));

        let gate = Arc::new(Semaphore::new(0));
        let probe = parked_probe(&breaker, &gate, Err(TestError::Transient)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert_eq!(breaker.reset().state, CircuitState::Closed);
        gate.add_permits(1);
        let result = probe.await.unwrap();
        assert_eq!(result, Err(BreakerError::Operation(TestError::Transient)));

        // One failure would trip a threshold of 1 if it still counted
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.last_failure_at.is_none());

        let metrics = breaker.metrics().snapshot();
        assert_eq!(metrics.failures, 2);
        assert_eq!(metrics.circuit_open_count, 1);
    }

    #[tokio::test]
    async fn test_probe_success_after_force_open_only_reaches_metrics() {
        let (breaker, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(1));

        let gate = Arc::new(Semaphore::new(0));
        let stale = parked_probe(&breaker, &gate, Ok(())).await;

        breaker.force_open();
        clock.advance(Duration::from_secs(1));
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.snapshot().consecutive_successes, 1);

        gate.add_permits(1);
        assert_eq!(stale.await.unwrap(), Ok(()));

        // A second counted success would have closed the breaker
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.consecutive_successes, 1);
        assert_eq!(breaker.metrics().snapshot().successes, 2);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());

        let zero_failures = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_failures.validate(),
            Err(ResilienceError::InvalidConfig(_))
        ));

        let zero_timeout = CircuitBreakerConfig {
            call_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(CircuitState::Open.to_string(), "open");
    }
}
