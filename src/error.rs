/*!
 * Error types for RiskGuard
 */

use riskguard_core_resilience::ResilienceError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskGuardError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum RiskGuardError {
    /// Configuration rejected at load time
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("TOML render error: {0}")]
    TomlRender(#[from] toml::ser::Error),

    /// Registry or monitoring failure
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// Metrics exposition failure
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] prometheus::Error),
}

impl RiskGuardError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RiskGuardError::Config(_)
            | RiskGuardError::Toml(_)
            | RiskGuardError::Resilience(ResilienceError::InvalidConfig(_)) => EXIT_FATAL,
            _ => EXIT_RUNTIME,
        }
    }

    /// Whether the error came from configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RiskGuardError::Config(_)
                | RiskGuardError::Toml(_)
                | RiskGuardError::Resilience(ResilienceError::InvalidConfig(_))
        )
    }
}
