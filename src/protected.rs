/*!
 * Circuit-breaker protected risk scoring
 *
 * Every call goes through the service's breaker. When the breaker rejects
 * the call, the call times out, or the model errors, the fallback policy
 * answers instead (unless fallback is disabled, in which case the error is
 * returned unchanged). Results carry their provenance.
 */

use crate::config::RiskGuardConfig;
use crate::error::Result;
use crate::scoring::{FallbackPolicy, ModelError, RiskFeatures, RiskModel, RiskScore};
use chrono::{DateTime, Utc};
use riskguard_core_resilience::health::{HealthInputs, HealthReport};
use riskguard_core_resilience::{
    BreakerError, BreakerRegistry, BreakerSnapshot, CallOutcome, CircuitBreaker,
    CircuitBreakerConfig, CircuitState,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Primary,
    Fallback,
}

/// Why the fallback answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    CircuitOpen,
    Timeout,
    ModelError,
}

impl FallbackReason {
    fn from_breaker_error(err: &BreakerError<ModelError>) -> Self {
        match err {
            BreakerError::CircuitOpen { .. } => FallbackReason::CircuitOpen,
            BreakerError::Timeout { .. } => FallbackReason::Timeout,
            BreakerError::Operation(_) => FallbackReason::ModelError,
        }
    }
}

/// Value plus provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectedCallResult<T> {
    pub value: T,
    pub source: Source,
    pub breaker_state_at_completion: CircuitState,
    pub latency: Duration,
    pub model_version: String,
    pub fallback_reason: Option<FallbackReason>,
}

impl<T> ProtectedCallResult<T> {
    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }
}

/// Service-level performance counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    pub total_predictions: u64,
    pub model_predictions: u64,
    pub fallback_predictions: u64,
    pub avg_response_time: Duration,
    pub last_prediction_at: Option<DateTime<Utc>>,
}

impl ServiceStats {
    /// Share of predictions answered by the fallback
    pub fn fallback_rate(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.fallback_predictions as f64 / self.total_predictions as f64
        }
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    stats: ServiceStats,
    response_time_sum: Duration,
}

/// Health of the protected service as seen by operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub breaker: BreakerSnapshot,
    pub stats: ServiceStats,
    pub report: HealthReport,
    pub fallback_enabled: bool,
    pub model_version: String,
    pub fallback_version: String,
}

/// Risk scoring guarded by a circuit breaker with a local fallback
pub struct ProtectedScoringService {
    breaker: CircuitBreaker,
    model: Arc<dyn RiskModel>,
    fallback: Arc<dyn FallbackPolicy>,
    stats: Mutex<StatsInner>,
}

impl std::fmt::Debug for ProtectedScoringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedScoringService")
            .field("breaker", &self.breaker.name())
            .field("model_version", &self.model.version())
            .field("fallback_version", &self.fallback.version())
            .finish()
    }
}

impl ProtectedScoringService {
    /// Register (or reuse) breaker `name` in `registry` and wrap `model` with it
    pub fn new(
        registry: &BreakerRegistry,
        name: &str,
        config: CircuitBreakerConfig,
        model: Arc<dyn RiskModel>,
        fallback: Arc<dyn FallbackPolicy>,
    ) -> Result<Self> {
        config.validate()?;
        let breaker = registry.get_or_create(name, config);

        tracing::info!(
            breaker = name,
            model_version = model.version(),
            fallback_version = fallback.version(),
            fallback_enabled = breaker.config().fallback_enabled,
            "Protected scoring service initialized"
        );

        Ok(Self {
            breaker,
            model,
            fallback,
            stats: Mutex::new(StatsInner::default()),
        })
    }

    /// Build from the `[service]` section and its breaker table
    pub fn from_config(
        registry: &BreakerRegistry,
        config: &RiskGuardConfig,
        model: Arc<dyn RiskModel>,
        fallback: Arc<dyn FallbackPolicy>,
    ) -> Result<Self> {
        Self::new(
            registry,
            &config.service.breaker_name,
            config.service_breaker().to_breaker_config(),
            model,
            fallback,
        )
    }

    /// Score `features`, falling back when the protected call fails
    pub async fn get_score(
        &self,
        features: &RiskFeatures,
    ) -> std::result::Result<ProtectedCallResult<RiskScore>, BreakerError<ModelError>> {
        let started = tokio::time::Instant::now();
        let outcome = self.breaker.execute(|| self.model.score(features)).await;
        let latency = started.elapsed();

        match outcome {
            Ok(score) => {
                self.record_prediction(Source::Primary, latency);
                Ok(ProtectedCallResult {
                    value: score,
                    source: Source::Primary,
                    breaker_state_at_completion: self.breaker.state(),
                    latency,
                    model_version: self.model.version().to_string(),
                    fallback_reason: None,
                })
            }
            Err(err) if self.breaker.config().fallback_enabled => {
                let reason = FallbackReason::from_breaker_error(&err);
                tracing::warn!(
                    breaker = self.breaker.name(),
                    reason = ?reason,
                    error = %err,
                    "Risk model call failed, using fallback"
                );

                let score = self.fallback.score(features);
                let latency = started.elapsed();
                let state = self.breaker.state();

                self.breaker
                    .metrics()
                    .record_call(CallOutcome::Fallback, latency, state);
                self.record_prediction(Source::Fallback, latency);

                Ok(ProtectedCallResult {
                    value: score,
                    source: Source::Fallback,
                    breaker_state_at_completion: state,
                    latency,
                    model_version: self.fallback.version().to_string(),
                    fallback_reason: Some(reason),
                })
            }
            Err(err) => {
                tracing::error!(
                    breaker = self.breaker.name(),
                    error = %err,
                    "Risk model call failed and fallback is disabled"
                );
                Err(err)
            }
        }
    }

    /// Service-level counters
    pub fn stats(&self) -> ServiceStats {
        self.lock_stats().stats.clone()
    }

    /// Health score, status and recommendations for the service
    pub fn service_health(&self) -> ServiceHealth {
        let breaker = self.breaker.snapshot();
        let metrics = self.breaker.metrics().snapshot();
        let stats = self.stats();

        let inputs = HealthInputs {
            state: breaker.state,
            failure_rate: metrics.recent_failure_rate,
            fallback_rate: stats.fallback_rate(),
            avg_latency: stats.avg_response_time,
        };

        ServiceHealth {
            report: HealthReport::assess(&inputs, "ML service"),
            breaker,
            stats,
            fallback_enabled: self.breaker.config().fallback_enabled,
            model_version: self.model.version().to_string(),
            fallback_version: self.fallback.version().to_string(),
        }
    }

    /// Force the breaker closed
    pub fn reset_breaker(&self) -> BreakerSnapshot {
        tracing::info!(breaker = self.breaker.name(), "Manual breaker reset requested");
        self.breaker.reset()
    }

    /// Force the breaker open, routing every call to the fallback
    pub fn force_breaker_open(&self) -> BreakerSnapshot {
        tracing::warn!(breaker = self.breaker.name(), "Manual breaker open requested");
        self.breaker.force_open()
    }

    /// Zero the service counters
    pub fn reset_stats(&self) {
        *self.lock_stats() = StatsInner::default();
    }

    /// Breaker guarding the model
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn record_prediction(&self, source: Source, latency: Duration) {
        let mut guard = self.lock_stats();
        let inner = &mut *guard;
        inner.response_time_sum += latency;

        let stats = &mut inner.stats;
        stats.total_predictions += 1;
        match source {
            Source::Primary => stats.model_predictions += 1,
            Source::Fallback => stats.fallback_predictions += 1,
        }
        stats.last_prediction_at = Some(Utc::now());

        let count = u32::try_from(stats.total_predictions).unwrap_or(u32::MAX);
        stats.avg_response_time = inner.response_time_sum / count;
    }

    fn lock_stats(&self) -> MutexGuard<'_, StatsInner> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::scoring::{RuleBasedFallback, SimulatedModel};
    use riskguard_core_resilience::ManualClock;

    fn service_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn features() -> RiskFeatures {
        RiskFeatures {
            transaction_count: 20,
            avg_transaction_amount: 2_000.0,
            current_credit_limit: 5_000.0,
            ..Default::default()
        }
    }

    fn service(
        registry: &BreakerRegistry,
        model: Arc<SimulatedModel>,
        config: CircuitBreakerConfig,
    ) -> ProtectedScoringService {
        ProtectedScoringService::new(
            registry,
            "ml_model_service",
            config,
            model,
            Arc::new(RuleBasedFallback),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_result() {
        init_test_logging();
        let registry = BreakerRegistry::new();
        let model = Arc::new(SimulatedModel::healthy(Duration::from_millis(100)));
        let svc = service(&registry, model, service_config());

        let result = svc.get_score(&features()).await.unwrap();

        assert_eq!(result.source, Source::Primary);
        assert_eq!(result.breaker_state_at_completion, CircuitState::Closed);
        assert_eq!(result.model_version, "v1.0.0");
        assert_eq!(result.fallback_reason, None);
        assert!(result.latency >= Duration::from_millis(100));

        let stats = svc.stats();
        assert_eq!(stats.total_predictions, 1);
        assert_eq!(stats.model_predictions, 1);
        assert!(stats.last_prediction_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_error_falls_back() {
        let registry = BreakerRegistry::new();
        let model = Arc::new(SimulatedModel::healthy(Duration::ZERO));
        model.set_outage(true);
        let svc = service(&registry, model, service_config());

        let result = svc.get_score(&features()).await.unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.fallback_reason, Some(FallbackReason::ModelError));
        assert_eq!(result.value.value(), 0.5);
        assert_eq!(result.model_version, "fallback_v1.0");
        assert_eq!(svc.breaker().metrics().snapshot().fallback_invocations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let registry = BreakerRegistry::new();
        let model = Arc::new(SimulatedModel::healthy(Duration::from_secs(10)));
        let svc = service(&registry, model, service_config());

        let result = svc.get_score(&features()).await.unwrap();

        assert_eq!(result.fallback_reason, Some(FallbackReason::Timeout));
        assert!(result.latency >= Duration::from_secs(5));
        assert_eq!(svc.breaker().snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_disabled_propagates() {
        let registry = BreakerRegistry::new();
        let model = Arc::new(SimulatedModel::healthy(Duration::ZERO));
        let svc = service(
            &registry,
            model,
            CircuitBreakerConfig {
                fallback_enabled: false,
                ..service_config()
            },
        );
        svc.force_breaker_open();

        let err = svc.get_score(&features()).await.unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(svc.stats().total_predictions, 0);
        assert_eq!(svc.breaker().metrics().snapshot().fallback_invocations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_scenario_with_fallback() {
        let clock = ManualClock::new();
        let registry = BreakerRegistry::with_clock(Arc::new(clock.clone()));
        let model = Arc::new(SimulatedModel::healthy(Duration::from_millis(10)));
        let svc = service(&registry, Arc::clone(&model), service_config());

        model.set_outage(true);
        for _ in 0..3 {
            let result = svc.get_score(&features()).await.unwrap();
            assert_eq!(result.fallback_reason, Some(FallbackReason::ModelError));
        }
        assert_eq!(svc.breaker().state(), CircuitState::Open);

        let calls_before = model.calls();
        let rejected = svc.get_score(&features()).await.unwrap();
        assert_eq!(rejected.fallback_reason, Some(FallbackReason::CircuitOpen));
        assert_eq!(rejected.breaker_state_at_completion, CircuitState::Open);
        assert_eq!(model.calls(), calls_before);

        model.set_outage(false);
        clock.advance(Duration::from_secs(30));

        let probe = svc.get_score(&features()).await.unwrap();
        assert_eq!(probe.source, Source::Primary);
        assert_eq!(probe.breaker_state_at_completion, CircuitState::HalfOpen);
        assert_eq!(svc.breaker().snapshot().consecutive_successes, 1);

        let closing = svc.get_score(&features()).await.unwrap();
        assert_eq!(closing.breaker_state_at_completion, CircuitState::Closed);
        let snapshot = svc.breaker().snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.consecutive_successes, 0);

        let stats = svc.stats();
        assert_eq!(stats.total_predictions, 6);
        assert_eq!(stats.fallback_predictions, 4);
        assert_eq!(stats.model_predictions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_health_tracks_fallbacks() {
        let registry = BreakerRegistry::new();
        let model = Arc::new(SimulatedModel::healthy(Duration::ZERO));
        let svc = service(&registry, model, service_config());

        let healthy = svc.service_health();
        assert_eq!(healthy.report.score, 100.0);
        assert_eq!(healthy.model_version, "v1.0.0");
        assert_eq!(healthy.fallback_version, "fallback_v1.0");

        svc.force_breaker_open();
        svc.get_score(&features()).await.unwrap();

        let degraded = svc.service_health();
        // 100 - 40 (open) - 20 (every prediction fell back)
        assert_eq!(degraded.report.score, 40.0);
        assert_eq!(degraded.breaker.state, CircuitState::Open);

        let closed = svc.reset_breaker();
        assert_eq!(closed.state, CircuitState::Closed);
        svc.reset_stats();
        assert_eq!(svc.stats(), ServiceStats::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = BreakerRegistry::new();
        let err = ProtectedScoringService::new(
            &registry,
            "ml_model_service",
            CircuitBreakerConfig {
                failure_threshold: 0,
                ..Default::default()
            },
            Arc::new(SimulatedModel::healthy(Duration::ZERO)),
            Arc::new(RuleBasedFallback),
        )
        .unwrap_err();

        assert!(err.is_config());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_serialized_provenance() {
        let result = ProtectedCallResult {
            value: RiskScore::new(0.42),
            source: Source::Fallback,
            breaker_state_at_completion: CircuitState::Open,
            latency: Duration::from_millis(3),
            model_version: "fallback_v1.0".to_string(),
            fallback_reason: Some(FallbackReason::CircuitOpen),
        };
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["source"], "FALLBACK");
        assert_eq!(json["value"], 0.42);
        assert_eq!(json["breaker_state_at_completion"], "open");
        assert_eq!(json["fallback_reason"], "circuit_open");
    }
}
