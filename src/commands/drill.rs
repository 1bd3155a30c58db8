/*!
 * Breaker drill
 *
 * Walks the protected service through a full outage and recovery on a
 * manual clock: failures until the breaker opens, a short-circuited call,
 * the recovery timeout, then probes until the breaker closes again.
 */

use crate::cli_style::{self, section_header, Theme};
use crate::config::BreakerSettings;
use crate::protected::{ProtectedCallResult, ProtectedScoringService};
use crate::scoring::{RiskFeatures, RiskScore, RuleBasedFallback, SimulatedModel};
use anyhow::{Context, Result};
use riskguard_core_resilience::{BreakerRegistry, BreakerSnapshot, ManualClock, MetricsSnapshot};
use std::sync::Arc;
use std::time::Duration;

/// Breaker name used by the drill
pub const DRILL_BREAKER: &str = "drill_model_service";

/// One observed step
#[derive(Debug, Clone)]
pub struct DrillStep {
    pub description: String,
    pub result: Option<ProtectedCallResult<RiskScore>>,
    pub snapshot: BreakerSnapshot,
    pub metrics: MetricsSnapshot,
    /// Times the model was actually invoked so far
    pub model_calls: u64,
}

/// Run the drill with `settings` and return every step
pub async fn run_drill(settings: &BreakerSettings) -> Result<Vec<DrillStep>> {
    let clock = ManualClock::new();
    let registry = BreakerRegistry::with_clock(Arc::new(clock.clone()));
    let model = Arc::new(SimulatedModel::healthy(Duration::ZERO));
    let config = settings.to_breaker_config();
    let recovery = config.recovery_timeout;

    let service = ProtectedScoringService::new(
        &registry,
        DRILL_BREAKER,
        config,
        model.clone(),
        Arc::new(RuleBasedFallback),
    )
    .context("Drill breaker settings rejected")?;

    let features = RiskFeatures {
        transaction_count: 12,
        avg_transaction_amount: 1_500.0,
        current_credit_limit: 8_000.0,
        ..Default::default()
    };

    let mut steps = Vec::new();
    let mut call = |description: String, result: Option<ProtectedCallResult<RiskScore>>| {
        steps.push(DrillStep {
            description,
            result,
            snapshot: service.breaker().snapshot(),
            metrics: service.breaker().metrics().snapshot(),
            model_calls: model.calls(),
        });
    };

    model.set_outage(true);
    for i in 1..=settings.failure_threshold {
        let result = service.get_score(&features).await.ok();
        call(format!("model down, call {}", i), result);
    }

    let result = service.get_score(&features).await.ok();
    call("call while open".to_string(), result);

    model.set_outage(false);
    clock.advance(recovery);
    call(
        format!("model recovered, clock advanced {:?}", recovery),
        None,
    );

    for i in 1..=settings.success_threshold {
        let result = service.get_score(&features).await.ok();
        call(format!("probe {}", i), result);
    }

    Ok(steps)
}

/// Print the drill the way the CLI shows it
pub fn print_drill(steps: &[DrillStep]) {
    section_header("Breaker drill");
    for (n, step) in steps.iter().enumerate() {
        let outcome = step
            .result
            .as_ref()
            .map(cli_style::describe_result)
            .unwrap_or_else(|| Theme::muted("no call").to_string());
        println!(
            "{:>2}. {:<40} {} | state {} failures {} successes {} model calls {}",
            n + 1,
            step.description,
            outcome,
            step.snapshot.state,
            step.snapshot.consecutive_failures,
            step.snapshot.consecutive_successes,
            step.model_calls
        );
    }

    if let Some(last) = steps.last() {
        section_header("Breaker metrics");
        println!("{}", cli_style::metrics_table(&last.metrics));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protected::{FallbackReason, Source};
    use riskguard_core_resilience::CircuitState;

    #[tokio::test]
    async fn test_default_drill() {
        let steps = run_drill(&BreakerSettings::default()).await.unwrap();

        // 3 failures, 1 rejection, clock step, 2 probes
        assert_eq!(steps.len(), 7);

        assert_eq!(steps[2].snapshot.state, CircuitState::Open);
        let rejected = steps[3].result.as_ref().unwrap();
        assert_eq!(rejected.source, Source::Fallback);
        assert_eq!(rejected.fallback_reason, Some(FallbackReason::CircuitOpen));
        assert_eq!(steps[3].model_calls, 3);

        assert!(steps[4].result.is_none());

        assert_eq!(steps[5].snapshot.state, CircuitState::HalfOpen);
        assert_eq!(steps[5].snapshot.consecutive_successes, 1);

        let last = &steps[6];
        assert_eq!(last.snapshot.state, CircuitState::Closed);
        assert_eq!(last.snapshot.consecutive_failures, 0);
        assert_eq!(last.snapshot.consecutive_successes, 0);
        assert_eq!(last.result.as_ref().unwrap().source, Source::Primary);

        // 3 failures, 1 rejection, 2 successes, plus 4 fallbacks
        assert_eq!(last.metrics.failures, 3);
        assert_eq!(last.metrics.rejections, 1);
        assert_eq!(last.metrics.successes, 2);
        assert_eq!(last.metrics.fallback_invocations, 4);
        assert_eq!(last.metrics.circuit_open_count, 1);
    }

    #[tokio::test]
    async fn test_drill_rejects_invalid_settings() {
        let settings = BreakerSettings {
            success_threshold: 0,
            ..Default::default()
        };
        assert!(run_drill(&settings).await.is_err());
    }
}
