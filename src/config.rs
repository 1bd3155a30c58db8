/*!
 * Configuration types for RiskGuard
 */

use crate::error::{Result, RiskGuardError};
use riskguard_core_resilience::{CircuitBreakerConfig, ErrorClass, FailureClassifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the breaker guarding the risk model unless configured otherwise
pub const DEFAULT_BREAKER_NAME: &str = "ml_model_service";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskGuardConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-breaker settings keyed by breaker name
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerSettings>,
}

/// Logging section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for level = debug)
    #[serde(default)]
    pub verbose: bool,
}

/// Protected scoring service section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Breaker guarding the risk model
    #[serde(default = "default_breaker_name")]
    pub breaker_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            breaker_name: default_breaker_name(),
        }
    }
}

/// One `[breakers.<name>]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    #[serde(default = "default_metrics_window_size")]
    pub metrics_window_size: usize,

    /// Error classes that count against the breaker
    #[serde(default = "default_qualifying_errors")]
    pub qualifying_errors: Vec<ErrorClass>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            fallback_enabled: true,
            metrics_window_size: default_metrics_window_size(),
            qualifying_errors: default_qualifying_errors(),
        }
    }
}

impl BreakerSettings {
    /// Convert to the core breaker configuration
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            classifier: FailureClassifier::only(self.qualifying_errors.iter().copied()),
            fallback_enabled: self.fallback_enabled,
            metrics_window_size: self.metrics_window_size,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_breaker_name() -> String {
    DEFAULT_BREAKER_NAME.to_string()
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    2
}

fn default_recovery_timeout_secs() -> u64 {
    30
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_metrics_window_size() -> usize {
    50
}

fn default_qualifying_errors() -> Vec<ErrorClass> {
    FailureClassifier::default().classes().to_vec()
}

impl RiskGuardConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            breakers = config.breakers.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RiskGuardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Settings for `name`, falling back to defaults when it has no table
    pub fn breaker_settings(&self, name: &str) -> BreakerSettings {
        self.breakers.get(name).cloned().unwrap_or_default()
    }

    /// Settings for the breaker guarding the risk model
    pub fn service_breaker(&self) -> BreakerSettings {
        self.breaker_settings(&self.service.breaker_name)
    }

    /// Reject any breaker table the state machine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.service.breaker_name.trim().is_empty() {
            return Err(RiskGuardError::Config(
                "service.breaker_name must not be empty".to_string(),
            ));
        }
        for (name, settings) in &self.breakers {
            settings
                .to_breaker_config()
                .validate()
                .map_err(|e| RiskGuardError::Config(format!("breakers.{}: {}", name, e)))?;
        }
        Ok(())
    }
}
