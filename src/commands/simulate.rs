/*!
 * Load simulation against a flaky in-process model
 *
 * Drives many concurrent requests through the protected service and reports
 * how the breaker and the fallback coped.
 */

use crate::cli_style::{self, section_header};
use crate::config::RiskGuardConfig;
use crate::monitoring::{SystemHealth, SystemMonitor};
use crate::protected::{ProtectedScoringService, ServiceHealth, Source};
use crate::scoring::{RiskFeatures, RuleBasedFallback, SimulatedModel, SimulationProfile};
use crate::telemetry::TelemetryExporter;
use anyhow::{ensure, Context, Result};
use futures::stream::{self, StreamExt};
use riskguard_core_resilience::{BreakerMonitor, BreakerOverview, BreakerRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Knobs for one simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    pub requests: usize,
    pub failure_rate: f64,
    pub latency: Duration,
    pub concurrency: usize,
    pub seed: u64,
    /// Also render the Prometheus exposition
    pub prometheus: bool,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            requests: 200,
            failure_rate: 0.3,
            latency: Duration::from_millis(20),
            concurrency: 8,
            seed: 42,
            prometheus: false,
        }
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub primary: usize,
    pub fallback: usize,
    /// Errors returned to callers (only when fallback is disabled)
    pub errors: usize,
    pub service: ServiceHealth,
    pub system: SystemHealth,
    pub breakers: BreakerOverview,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<String>,
}

/// Deterministic spread of customer profiles
pub fn synthetic_features(i: usize) -> RiskFeatures {
    const EMOTIONS: [&str; 6] = ["calm", "joy", "stress", "fear", "neutral", "confident"];

    RiskFeatures {
        transaction_count: (i * 7 % 150) as u64,
        avg_transaction_amount: 200.0 + (i * 131 % 4_000) as f64,
        current_credit_limit: 2_000.0 + (i * 977 % 120_000) as f64,
        avg_valence: Some(((i % 21) as f64 - 10.0) / 10.0),
        avg_arousal: Some((i % 11) as f64 / 10.0),
        last_emotion: Some(EMOTIONS[i % EMOTIONS.len()].to_string()),
    }
}

/// Run `options.requests` calls with at most `options.concurrency` in flight
pub async fn run_simulation(
    config: &RiskGuardConfig,
    options: &SimulateOptions,
) -> Result<SimulationReport> {
    ensure!(
        (0.0..=1.0).contains(&options.failure_rate),
        "failure rate must be between 0 and 1, got {}",
        options.failure_rate
    );
    ensure!(options.concurrency > 0, "concurrency must be at least 1");

    let registry = BreakerRegistry::new();
    let model = Arc::new(SimulatedModel::new(SimulationProfile {
        failure_rate: options.failure_rate,
        latency: options.latency,
        seed: options.seed,
    }));
    let service = Arc::new(
        ProtectedScoringService::from_config(&registry, config, model, Arc::new(RuleBasedFallback))
            .context("Failed to build protected scoring service")?,
    );

    tracing::info!(
        requests = options.requests,
        failure_rate = options.failure_rate,
        concurrency = options.concurrency,
        "Starting simulation"
    );

    let outcomes: Vec<_> = stream::iter(0..options.requests)
        .map(|i| {
            let service = Arc::clone(&service);
            async move { service.get_score(&synthetic_features(i)).await }
        })
        .buffer_unordered(options.concurrency)
        .collect()
        .await;

    let mut primary = 0;
    let mut fallback = 0;
    let mut errors = 0;
    for outcome in &outcomes {
        match outcome {
            Ok(result) if result.source == Source::Primary => primary += 1,
            Ok(_) => fallback += 1,
            Err(_) => errors += 1,
        }
    }

    let monitor = SystemMonitor::new(Arc::clone(&service), BreakerMonitor::new(registry.clone()));
    let prometheus = if options.prometheus {
        let exporter = TelemetryExporter::new()?;
        Some(exporter.render(&registry)?)
    } else {
        None
    };

    Ok(SimulationReport {
        primary,
        fallback,
        errors,
        service: service.service_health(),
        system: monitor.system_health(),
        breakers: monitor.breakers().overview(),
        prometheus,
    })
}

/// Print a report the way the CLI shows it
pub fn print_report(report: &SimulationReport) {
    section_header("Requests");
    println!(
        "{}",
        cli_style::stats_table(&[
            ("Primary", report.primary.to_string()),
            ("Fallback", report.fallback.to_string()),
            ("Errors", report.errors.to_string()),
        ])
    );

    section_header("Service health");
    println!("{}", cli_style::service_health_table(&report.service));

    section_header("Circuit breakers");
    println!("{}", cli_style::breaker_table(&report.breakers));

    section_header("System");
    println!(
        "{}",
        cli_style::stats_table(&[
            ("Score", format!("{:.1}", report.system.score)),
            ("Status", report.system.status.to_string()),
        ])
    );
    for recommendation in &report.system.recommendations {
        cli_style::print_info(recommendation);
    }

    if let Some(ref text) = report.prometheus {
        section_header("Prometheus");
        print!("{}", text);
    }
}

/// Print a report as pretty JSON
pub fn print_report_json(report: &SimulationReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;

    #[tokio::test(start_paused = true)]
    async fn test_every_request_answered_with_fallback() {
        let report = run_simulation(
            &RiskGuardConfig::default(),
            &SimulateOptions {
                requests: 50,
                failure_rate: 1.0,
                latency: Duration::from_millis(5),
                concurrency: 4,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.primary, 0);
        assert_eq!(report.fallback, 50);
        assert_eq!(report.errors, 0);
        assert_eq!(report.breakers.total, 1);
        assert_eq!(report.breakers.open, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_model_stays_primary() {
        let report = run_simulation(
            &RiskGuardConfig::default(),
            &SimulateOptions {
                requests: 30,
                failure_rate: 0.0,
                prometheus: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.primary, 30);
        assert_eq!(report.service.stats.total_predictions, 30);
        let text = report.prometheus.unwrap();
        assert!(text.contains(
            r#"riskguard_breaker_calls_total{breaker="ml_model_service",outcome="success"} 30"#
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_surface_without_fallback() {
        let mut config = RiskGuardConfig::default();
        config.breakers.insert(
            "ml_model_service".to_string(),
            BreakerSettings {
                fallback_enabled: false,
                ..Default::default()
            },
        );

        let report = run_simulation(
            &config,
            &SimulateOptions {
                requests: 10,
                failure_rate: 1.0,
                concurrency: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.errors, 10);
        assert_eq!(report.fallback, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"], 10);
        assert_eq!(json["breakers"]["total"], 1);
        assert!(json.get("prometheus").is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_failure_rate() {
        let err = run_simulation(
            &RiskGuardConfig::default(),
            &SimulateOptions {
                failure_rate: 1.5,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failure rate"));
    }

    #[test]
    fn test_synthetic_features_are_valid() {
        for i in 0..500 {
            let f = synthetic_features(i);
            assert!(f.current_credit_limit > 0.0);
            assert!(f.avg_transaction_amount >= 0.0);
            assert!((-1.0..=1.0).contains(&f.avg_valence.unwrap()));
        }
    }
}
