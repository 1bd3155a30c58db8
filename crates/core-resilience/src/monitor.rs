//! Monitoring surface over a breaker registry
//!
//! Read-only queries (state, metrics, health) and the two manual overrides
//! (reset, force open), all addressed by breaker name. Unknown names yield
//! [`ResilienceError::UnknownBreaker`].

use crate::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
use crate::error::ResilienceError;
use crate::health::{state_score, HealthInputs, HealthReport};
use crate::metrics::MetricsSnapshot;
use crate::registry::BreakerRegistry;
use serde::Serialize;

/// Everything known about one breaker at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatus {
    #[serde(flatten)]
    pub snapshot: BreakerSnapshot,
    pub metrics: MetricsSnapshot,
    pub health: HealthReport,
}

/// Fleet-wide summary of every registered breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerOverview {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    /// Mean of per-state scores; 100 when nothing is registered
    pub state_score: f64,
    pub breakers: Vec<BreakerStatus>,
}

/// Name-addressed view over a [`BreakerRegistry`]
#[derive(Debug, Clone)]
pub struct BreakerMonitor {
    registry: BreakerRegistry,
}

impl BreakerMonitor {
    pub fn new(registry: BreakerRegistry) -> Self {
        Self { registry }
    }

    /// Registry being monitored
    pub fn registry(&self) -> &BreakerRegistry {
        &self.registry
    }

    /// Current snapshot of `name`
    pub fn state(&self, name: &str) -> Result<BreakerSnapshot, ResilienceError> {
        Ok(self.lookup(name)?.snapshot())
    }

    /// Metrics of `name`
    pub fn metrics(&self, name: &str) -> Result<MetricsSnapshot, ResilienceError> {
        Ok(self.lookup(name)?.metrics().snapshot())
    }

    /// Health report of `name`, computed from its own metrics
    pub fn health(&self, name: &str) -> Result<HealthReport, ResilienceError> {
        let breaker = self.lookup(name)?;
        Ok(Self::health_of(&breaker))
    }

    /// Snapshot, metrics and health of `name` in one call
    pub fn status(&self, name: &str) -> Result<BreakerStatus, ResilienceError> {
        let breaker = self.lookup(name)?;
        Ok(Self::status_of(&breaker))
    }

    /// Force `name` closed and return the resulting snapshot
    pub fn reset(&self, name: &str) -> Result<BreakerSnapshot, ResilienceError> {
        Ok(self.lookup(name)?.reset())
    }

    /// Force `name` open and return the resulting snapshot
    pub fn force_open(&self, name: &str) -> Result<BreakerSnapshot, ResilienceError> {
        Ok(self.lookup(name)?.force_open())
    }

    /// Zero the metrics of `name`; breaker state is left alone
    pub fn reset_metrics(&self, name: &str) -> Result<(), ResilienceError> {
        self.lookup(name)?.metrics().reset();
        tracing::info!(breaker = name, "Circuit breaker metrics reset");
        Ok(())
    }

    /// Summarize every registered breaker
    pub fn overview(&self) -> BreakerOverview {
        let breakers: Vec<BreakerStatus> = self
            .registry
            .breakers()
            .iter()
            .map(Self::status_of)
            .collect();

        let count = |wanted: CircuitState| {
            breakers
                .iter()
                .filter(|b| b.snapshot.state == wanted)
                .count()
        };

        let state_score = if breakers.is_empty() {
            100.0
        } else {
            breakers
                .iter()
                .map(|b| state_score(b.snapshot.state))
                .sum::<f64>()
                / breakers.len() as f64
        };

        BreakerOverview {
            total: breakers.len(),
            closed: count(CircuitState::Closed),
            open: count(CircuitState::Open),
            half_open: count(CircuitState::HalfOpen),
            state_score,
            breakers,
        }
    }

    fn lookup(&self, name: &str) -> Result<CircuitBreaker, ResilienceError> {
        self.registry
            .get(name)
            .ok_or_else(|| ResilienceError::UnknownBreaker(name.to_string()))
    }

    fn health_of(breaker: &CircuitBreaker) -> HealthReport {
        let inputs = HealthInputs::from_metrics(breaker.state(), &breaker.metrics().snapshot());
        HealthReport::assess(&inputs, breaker.name())
    }

    fn status_of(breaker: &CircuitBreaker) -> BreakerStatus {
        let snapshot = breaker.snapshot();
        let metrics = breaker.metrics().snapshot();
        let inputs = HealthInputs::from_metrics(snapshot.state, &metrics);
        BreakerStatus {
            health: HealthReport::assess(&inputs, breaker.name()),
            snapshot,
            metrics,
        }
    }
}
