/*!
 * RiskGuard - circuit-breaker protected risk scoring
 *
 * Guards calls to an unreliable risk model with a circuit breaker and
 * answers from a deterministic rule-based fallback whenever the model is
 * short-circuited, slow, or failing:
 * - Protected scoring service with PRIMARY/FALLBACK provenance
 * - Pluggable risk model and fallback policy
 * - Service and system health scoring with operator recommendations
 * - Prometheus text exposition of every breaker
 * - TOML configuration and tracing-based logging
 *
 * The breaker itself lives in `riskguard-core-resilience`.
 */

pub mod cli_style;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod protected;
pub mod scoring;
pub mod telemetry;

// Re-export commonly used types
pub use config::{BreakerSettings, LogLevel, RiskGuardConfig};
pub use error::{Result, RiskGuardError};
pub use monitoring::{Diagnostics, SystemHealth, SystemMonitor, SystemStatus};
pub use protected::{
    FallbackReason, ProtectedCallResult, ProtectedScoringService, ServiceHealth, ServiceStats,
    Source,
};
pub use scoring::{
    FallbackPolicy, ModelError, RiskFeatures, RiskModel, RiskScore, RuleBasedFallback,
    SimulatedModel,
};
pub use telemetry::TelemetryExporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
