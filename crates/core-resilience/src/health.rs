//! Health scoring for breakers and the services behind them
//!
//! A pure function of four inputs: breaker state, failure rate, fallback rate
//! and average latency. Penalties are subtracted from 100 and the result is
//! clamped to `[0, 100]` once, at the end, so intermediate values may go
//! negative.
//!
//! # Example
//!
//! ```
//! use riskguard_core_resilience::health::{health_score, HealthInputs};
//! use riskguard_core_resilience::CircuitState;
//! use std::time::Duration;
//!
//! let score = health_score(&HealthInputs {
//!     state: CircuitState::Open,
//!     failure_rate: 0.5,
//!     fallback_rate: 0.3,
//!     avg_latency: Duration::from_secs(2),
//! });
//! assert!((score - 39.0).abs() < 1e-9);
//! ```

use crate::circuit_breaker::CircuitState;
use crate::metrics::MetricsSnapshot;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Latency above which the score starts to drop
pub const LATENCY_BASELINE: Duration = Duration::from_secs(2);

/// Latency above which a slow-response advisory is raised
pub const SLOW_RESPONSE_THRESHOLD: Duration = Duration::from_secs(3);

/// Recent failure rate above which a failure advisory is raised
pub const FAILURE_RATE_ADVISORY: f64 = 0.2;

/// Fallback rate above which a fallback advisory is raised
pub const FALLBACK_RATE_ADVISORY: f64 = 0.3;

/// Everything the health score depends on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthInputs {
    pub state: CircuitState,
    /// Fraction of recent calls that failed (0.0 - 1.0)
    pub failure_rate: f64,
    /// Fraction of calls answered by the fallback (0.0 - 1.0)
    pub fallback_rate: f64,
    pub avg_latency: Duration,
}

impl HealthInputs {
    /// Derive inputs from a breaker's own metrics
    pub fn from_metrics(state: CircuitState, metrics: &MetricsSnapshot) -> Self {
        Self {
            state,
            failure_rate: metrics.recent_failure_rate,
            fallback_rate: metrics.fallback_rate,
            avg_latency: metrics.avg_latency,
        }
    }
}

/// Compute the health score in `[0, 100]`
pub fn health_score(inputs: &HealthInputs) -> f64 {
    let mut score = 100.0;

    score -= match inputs.state {
        CircuitState::Open => 40.0,
        CircuitState::HalfOpen => 20.0,
        CircuitState::Closed => 0.0,
    };

    score -= inputs.failure_rate * 30.0;
    score -= inputs.fallback_rate * 20.0;

    if inputs.avg_latency > LATENCY_BASELINE {
        let excess = (inputs.avg_latency - LATENCY_BASELINE).as_secs_f64();
        score -= (excess * 5.0).min(10.0);
    }

    score.clamp(0.0, 100.0)
}

/// Score a bare breaker state for fleet-wide summaries
pub fn state_score(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 100.0,
        CircuitState::HalfOpen => 60.0,
        CircuitState::Open => 20.0,
    }
}

/// Bucketed health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Degraded,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthStatus::Excellent
        } else if score >= 75.0 {
            HealthStatus::Good
        } else if score >= 50.0 {
            HealthStatus::Degraded
        } else if score >= 25.0 {
            HealthStatus::Poor
        } else {
            HealthStatus::Critical
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Poor => "poor",
            HealthStatus::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Advisory produced from health inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Breaker is open; the dependency needs attention
    CircuitOpen,

    /// Recent failure rate is above the advisory threshold
    HighFailureRate { rate: f64 },

    /// Fallback is answering a large share of calls
    HighFallbackRate { rate: f64 },

    /// Average latency is above the slow-response threshold
    SlowResponses { avg_latency: Duration },

    /// No issues detected
    Healthy,
}

impl Advisory {
    /// Operator-facing recommendation for this advisory
    pub fn recommendation(&self, subject: &str) -> String {
        match self {
            Advisory::CircuitOpen => {
                format!("Circuit breaker is open - investigate {} issues", subject)
            }
            Advisory::HighFailureRate { rate } => format!(
                "High failure rate ({:.1}%) - check {} stability",
                rate * 100.0,
                subject
            ),
            Advisory::HighFallbackRate { rate } => format!(
                "High fallback usage ({:.1}%) - {} may be unreliable",
                rate * 100.0,
                subject
            ),
            Advisory::SlowResponses { avg_latency } => format!(
                "Slow response times ({:.2}s) - consider service optimization",
                avg_latency.as_secs_f64()
            ),
            Advisory::Healthy => "Service is operating normally".to_string(),
        }
    }
}

/// Produce advisories for a set of health inputs.
///
/// Returns a single `Advisory::Healthy` when nothing is wrong.
pub fn advisories(inputs: &HealthInputs) -> Vec<Advisory> {
    let mut advisories = Vec::new();

    if inputs.state == CircuitState::Open {
        advisories.push(Advisory::CircuitOpen);
    }
    if inputs.failure_rate > FAILURE_RATE_ADVISORY {
        advisories.push(Advisory::HighFailureRate {
            rate: inputs.failure_rate,
        });
    }
    if inputs.fallback_rate > FALLBACK_RATE_ADVISORY {
        advisories.push(Advisory::HighFallbackRate {
            rate: inputs.fallback_rate,
        });
    }
    if inputs.avg_latency > SLOW_RESPONSE_THRESHOLD {
        advisories.push(Advisory::SlowResponses {
            avg_latency: inputs.avg_latency,
        });
    }

    if advisories.is_empty() {
        advisories.push(Advisory::Healthy);
    }
    advisories
}

/// Score, bucket and advice for one breaker or service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub score: f64,
    pub status: HealthStatus,
    pub advisories: Vec<Advisory>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    /// Assess `inputs`; `subject` names the dependency in recommendations
    pub fn assess(inputs: &HealthInputs, subject: &str) -> Self {
        let score = health_score(inputs);
        let advisories = advisories(inputs);
        let recommendations = advisories
            .iter()
            .map(|a| a.recommendation(subject))
            .collect();

        Self {
            score,
            status: HealthStatus::from_score(score),
            advisories,
            recommendations,
        }
    }
}
