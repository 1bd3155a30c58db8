/*!
 * System-wide health and diagnostics
 *
 * Combines the protected service's own health with the state of every
 * registered breaker. This is what the (external) API layer serves from its
 * monitoring endpoints.
 */

use crate::protected::{ProtectedScoringService, ServiceHealth};
use chrono::{DateTime, Utc};
use riskguard_core_resilience::{BreakerMonitor, BreakerOverview, CircuitState};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Weight of the service health in the overall score
pub const SERVICE_WEIGHT: f64 = 0.8;

/// Weight of the mean breaker state score in the overall score
pub const BREAKER_WEIGHT: f64 = 0.2;

/// Overall system status bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl SystemStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            SystemStatus::Healthy
        } else if score >= 75.0 {
            SystemStatus::Degraded
        } else if score >= 50.0 {
            SystemStatus::Unhealthy
        } else {
            SystemStatus::Critical
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemStatus::Healthy => write!(f, "healthy"),
            SystemStatus::Degraded => write!(f, "degraded"),
            SystemStatus::Unhealthy => write!(f, "unhealthy"),
            SystemStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Weighted overall health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
    /// Rounded to one decimal
    pub score: f64,
    pub status: SystemStatus,
    pub recommendations: Vec<String>,
}

/// Full troubleshooting report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub generated_at: DateTime<Utc>,
    pub system: SystemHealth,
    pub service: ServiceHealth,
    pub breakers: BreakerOverview,
    pub potential_issues: Vec<String>,
    pub recommended_actions: Vec<String>,
}

/// Weigh service health against breaker states
pub fn system_health(service: &ServiceHealth, breakers: &BreakerOverview) -> SystemHealth {
    let service_score = service.report.score;
    let raw = service_score * SERVICE_WEIGHT + breakers.state_score * BREAKER_WEIGHT;
    let score = (raw * 10.0).round() / 10.0;

    let mut recommendations = Vec::new();
    if service_score < 80.0 {
        recommendations.extend(service.report.recommendations.iter().cloned());
    }
    if breakers.state_score < 80.0 {
        recommendations
            .push("Circuit breaker issues detected - check service stability".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("System is operating normally".to_string());
    }

    SystemHealth {
        score,
        status: SystemStatus::from_score(score),
        recommendations,
    }
}

/// Issues worth an operator's attention
pub fn potential_issues(service: &ServiceHealth, breakers: &BreakerOverview) -> Vec<String> {
    let mut issues = Vec::new();

    if service.report.score < 70.0 {
        issues.push(format!(
            "ML service health is {} (score: {:.1})",
            service.report.status, service.report.score
        ));
    }

    for breaker in &breakers.breakers {
        let name = &breaker.snapshot.name;
        match breaker.snapshot.state {
            CircuitState::Open => issues.push(format!("Circuit breaker '{}' is open", name)),
            CircuitState::HalfOpen => {
                issues.push(format!("Circuit breaker '{}' is in recovery mode", name))
            }
            CircuitState::Closed => {}
        }

        let rate = breaker.metrics.recent_failure_rate;
        if rate > 0.2 {
            issues.push(format!(
                "High failure rate ({:.1}%) for '{}'",
                rate * 100.0,
                name
            ));
        }
    }

    issues
}

/// Concrete next steps
pub fn recommended_actions(service: &ServiceHealth, breakers: &BreakerOverview) -> Vec<String> {
    let mut actions = Vec::new();

    if service.report.score < 80.0 {
        actions.extend(service.report.recommendations.iter().cloned());
    }

    for breaker in &breakers.breakers {
        let name = &breaker.snapshot.name;
        if breaker.snapshot.state == CircuitState::Open {
            actions.push(format!(
                "Investigate and fix issues causing '{}' to be open",
                name
            ));
        }
        if breaker.metrics.recent_failure_rate > 0.3 {
            actions.push(format!("Address high failure rate for '{}' service", name));
        }
    }

    if breakers.closed < breakers.total {
        actions.push("Monitor service logs for error patterns".to_string());
        actions.push("Consider scaling or optimizing affected services".to_string());
    }

    if actions.is_empty() {
        actions.push("Continue monitoring - system is healthy".to_string());
    }

    actions
}

/// Monitoring surface over the protected service and its registry
#[derive(Debug, Clone)]
pub struct SystemMonitor {
    service: Arc<ProtectedScoringService>,
    breakers: BreakerMonitor,
}

impl SystemMonitor {
    pub fn new(service: Arc<ProtectedScoringService>, breakers: BreakerMonitor) -> Self {
        Self { service, breakers }
    }

    /// Per-breaker queries and overrides
    pub fn breakers(&self) -> &BreakerMonitor {
        &self.breakers
    }

    pub fn system_health(&self) -> SystemHealth {
        system_health(&self.service.service_health(), &self.breakers.overview())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let service = self.service.service_health();
        let breakers = self.breakers.overview();

        let diagnostics = Diagnostics {
            generated_at: Utc::now(),
            system: system_health(&service, &breakers),
            potential_issues: potential_issues(&service, &breakers),
            recommended_actions: recommended_actions(&service, &breakers),
            service,
            breakers,
        };

        tracing::debug!(
            score = diagnostics.system.score,
            status = %diagnostics.system.status,
            issues = diagnostics.potential_issues.len(),
            "Diagnostics generated"
        );
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{RiskFeatures, RuleBasedFallback, SimulatedModel};
    use riskguard_core_resilience::{BreakerRegistry, CircuitBreakerConfig};
    use std::time::Duration;

    fn setup() -> (Arc<ProtectedScoringService>, SystemMonitor) {
        let registry = BreakerRegistry::new();
        let service = Arc::new(
            ProtectedScoringService::new(
                &registry,
                "ml_model_service",
                CircuitBreakerConfig::default(),
                Arc::new(SimulatedModel::healthy(Duration::ZERO)),
                Arc::new(RuleBasedFallback),
            )
            .unwrap(),
        );
        let monitor = SystemMonitor::new(Arc::clone(&service), BreakerMonitor::new(registry));
        (service, monitor)
    }

    #[test]
    fn test_healthy_system() {
        let (_, monitor) = setup();
        let health = monitor.system_health();

        assert_eq!(health.score, 100.0);
        assert_eq!(health.status, SystemStatus::Healthy);
        assert_eq!(health.recommendations, vec!["System is operating normally"]);

        let diagnostics = monitor.diagnostics();
        assert!(diagnostics.potential_issues.is_empty());
        assert_eq!(
            diagnostics.recommended_actions,
            vec!["Continue monitoring - system is healthy"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_system() {
        let (service, monitor) = setup();
        service.force_breaker_open();
        service.get_score(&RiskFeatures::default()).await.unwrap();

        // service: 100 - 40 - 20 = 40; breakers: 20
        let health = monitor.system_health();
        assert_eq!(health.score, 36.0);
        assert_eq!(health.status, SystemStatus::Critical);
        assert!(health
            .recommendations
            .iter()
            .any(|r| r.starts_with("Circuit breaker issues detected")));

        let diagnostics = monitor.diagnostics();
        assert!(diagnostics
            .potential_issues
            .contains(&"Circuit breaker 'ml_model_service' is open".to_string()));
        assert!(diagnostics
            .potential_issues
            .iter()
            .any(|i| i.starts_with("ML service health is poor")));
        assert!(diagnostics
            .recommended_actions
            .contains(&"Monitor service logs for error patterns".to_string()));
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(SystemStatus::from_score(90.0), SystemStatus::Healthy);
        assert_eq!(SystemStatus::from_score(75.0), SystemStatus::Degraded);
        assert_eq!(SystemStatus::from_score(50.0), SystemStatus::Unhealthy);
        assert_eq!(SystemStatus::from_score(49.9), SystemStatus::Critical);
    }
}
