//! Per-breaker metrics recorder
//!
//! Counters are plain atomics so concurrent callers never lose an increment.
//! The bounded histories (rolling result window, recent transitions, last
//! success/failure timestamps) sit behind one short-lived mutex. A snapshot
//! taken while writers are active may lag by an increment or two but is never
//! torn within a single counter.
//!
//! # Example
//!
//! ```
//! use riskguard_core_resilience::metrics::{CallOutcome, MetricsRecorder};
//! use riskguard_core_resilience::{CircuitState, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let recorder = MetricsRecorder::new(100, Arc::new(SystemClock));
//! recorder.record_call(CallOutcome::Success, Duration::from_millis(120), CircuitState::Closed);
//! recorder.record_call(CallOutcome::Rejected, Duration::ZERO, CircuitState::Open);
//!
//! let snapshot = recorder.snapshot();
//! assert_eq!(snapshot.total_calls, 2);
//! assert_eq!(snapshot.rejections, 1);
//! ```

use crate::circuit_breaker::CircuitState;
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of transition events kept for snapshots
pub const TRANSITION_HISTORY: usize = 64;

/// Outcome of one guarded call, as seen by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Operation ran and succeeded
    Success,
    /// Operation ran (or timed out) and counted against the breaker
    Failure,
    /// Operation was not invoked because the breaker blocked it
    Rejected,
    /// A fallback result was served in place of the primary one
    Fallback,
}

/// A recorded state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a breaker's metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Every `execute` invocation, whatever its outcome
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls blocked while open
    pub rejections: u64,
    pub fallback_invocations: u64,
    /// Operation errors the classifier let through without counting
    pub ignored_errors: u64,
    /// Times the breaker entered OPEN, forced or not
    pub circuit_open_count: u64,
    pub latency_sum: Duration,
    pub latency_count: u64,
    pub avg_latency: Duration,
    /// failures / (successes + failures) over the breaker's lifetime
    pub failure_rate: f64,
    /// Failure rate over the rolling window of recent results
    pub recent_failure_rate: f64,
    /// fallback invocations / total calls
    pub fallback_rate: f64,
    pub transition_count: u64,
    pub recent_transitions: Vec<TransitionEvent>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Breaker state reported with the most recent call
    pub last_observed_state: CircuitState,
}

#[derive(Debug, Default)]
struct RecentActivity {
    /// `true` marks a failure
    window: VecDeque<bool>,
    transitions: VecDeque<TransitionEvent>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Accumulates call outcomes and transitions for one breaker
#[derive(Debug)]
pub struct MetricsRecorder {
    clock: Arc<dyn Clock>,
    window_size: usize,

    total_calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    fallbacks: AtomicU64,
    ignored: AtomicU64,
    circuit_open_count: AtomicU64,
    transition_count: AtomicU64,
    latency_nanos: AtomicU64,
    latency_count: AtomicU64,
    last_state: AtomicU8,

    recent: Mutex<RecentActivity>,
}

impl MetricsRecorder {
    /// Create a recorder with a rolling window of `window_size` results
    pub fn new(window_size: usize, clock: Arc<dyn Clock>) -> Self {
        let window_size = window_size.max(1);
        Self {
            clock,
            window_size,
            total_calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            circuit_open_count: AtomicU64::new(0),
            transition_count: AtomicU64::new(0),
            latency_nanos: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            last_state: AtomicU8::new(state_code(CircuitState::Closed)),
            recent: Mutex::new(RecentActivity {
                window: VecDeque::with_capacity(window_size),
                ..Default::default()
            }),
        }
    }

    /// Record the outcome of a call
    pub fn record_call(&self, outcome: CallOutcome, latency: Duration, state: CircuitState) {
        self.last_state.store(state_code(state), Ordering::Relaxed);

        match outcome {
            CallOutcome::Success => {
                self.total_calls.fetch_add(1, Ordering::Relaxed);
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.observe_latency(latency);
                let now = self.clock.wall_clock();
                let mut recent = self.recent();
                recent.last_success_at = Some(now);
                self.push_result(&mut recent, false);
            }
            CallOutcome::Failure => {
                self.total_calls.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.observe_latency(latency);
                let now = self.clock.wall_clock();
                let mut recent = self.recent();
                recent.last_failure_at = Some(now);
                self.push_result(&mut recent, true);
            }
            CallOutcome::Rejected => {
                self.total_calls.fetch_add(1, Ordering::Relaxed);
                self.rejections.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::Fallback => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record an operation error that the classifier did not count
    pub fn record_ignored(&self, latency: Duration, state: CircuitState) {
        self.last_state.store(state_code(state), Ordering::Relaxed);
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.ignored.fetch_add(1, Ordering::Relaxed);
        self.observe_latency(latency);
    }

    /// Record a state change
    pub fn record_transition(&self, from: CircuitState, to: CircuitState, at: DateTime<Utc>) {
        self.transition_count.fetch_add(1, Ordering::Relaxed);
        if to == CircuitState::Open {
            self.circuit_open_count.fetch_add(1, Ordering::Relaxed);
        }
        self.last_state.store(state_code(to), Ordering::Relaxed);

        let mut recent = self.recent();
        recent.transitions.push_back(TransitionEvent { from, to, at });
        while recent.transitions.len() > TRANSITION_HISTORY {
            recent.transitions.pop_front();
        }
    }

    /// Build a snapshot of everything recorded so far
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let fallbacks = self.fallbacks.load(Ordering::Relaxed);
        let latency_nanos = self.latency_nanos.load(Ordering::Relaxed);
        let latency_count = self.latency_count.load(Ordering::Relaxed);

        let latency_sum = Duration::from_nanos(latency_nanos);
        let avg_latency = if latency_count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(latency_nanos / latency_count)
        };

        let recent = self.recent();
        let recent_failures = recent.window.iter().filter(|failed| **failed).count();

        MetricsSnapshot {
            total_calls,
            successes,
            failures,
            rejections: self.rejections.load(Ordering::Relaxed),
            fallback_invocations: fallbacks,
            ignored_errors: self.ignored.load(Ordering::Relaxed),
            circuit_open_count: self.circuit_open_count.load(Ordering::Relaxed),
            latency_sum,
            latency_count,
            avg_latency,
            failure_rate: ratio(failures, successes + failures),
            recent_failure_rate: ratio(recent_failures as u64, recent.window.len() as u64),
            fallback_rate: ratio(fallbacks, total_calls),
            transition_count: self.transition_count.load(Ordering::Relaxed),
            recent_transitions: recent.transitions.iter().cloned().collect(),
            last_success_at: recent.last_success_at,
            last_failure_at: recent.last_failure_at,
            last_observed_state: state_from_code(self.last_state.load(Ordering::Relaxed)),
        }
    }

    /// Zero every counter and clear the histories
    pub fn reset(&self) {
        for counter in [
            &self.total_calls,
            &self.successes,
            &self.failures,
            &self.rejections,
            &self.fallbacks,
            &self.ignored,
            &self.circuit_open_count,
            &self.transition_count,
            &self.latency_nanos,
            &self.latency_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        let mut recent = self.recent();
        recent.window.clear();
        recent.transitions.clear();
        recent.last_success_at = None;
        recent.last_failure_at = None;
    }

    fn observe_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .latency_nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_add(nanos))
            });
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    fn push_result(&self, recent: &mut RecentActivity, failed: bool) {
        recent.window.push_back(failed);
        while recent.window.len() > self.window_size {
            recent.window.pop_front();
        }
    }

    fn recent(&self) -> MutexGuard<'_, RecentActivity> {
        // Histories stay structurally valid even if a writer panicked mid-update
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn state_code(state: CircuitState) -> u8 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::Open => 1,
        CircuitState::HalfOpen => 2,
    }
}

fn state_from_code(code: u8) -> CircuitState {
    match code {
        1 => CircuitState::Open,
        2 => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}
