/*!
 * Risk scoring seam
 *
 * The protected service talks to a [`RiskModel`] and, when that fails, to a
 * [`FallbackPolicy`]. Both produce a [`RiskScore`] from the same
 * [`RiskFeatures`].
 */

pub mod fallback;
pub mod simulated;

use async_trait::async_trait;
use riskguard_core_resilience::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use fallback::{FallbackPolicy, RuleBasedFallback};
pub use simulated::{SimulatedModel, SimulationProfile};

/// Customer features fed to the model and the fallback policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatures {
    #[serde(default)]
    pub transaction_count: u64,

    #[serde(default)]
    pub avg_transaction_amount: f64,

    #[serde(default)]
    pub current_credit_limit: f64,

    /// Emotional valence in [-1, 1], when known
    #[serde(default)]
    pub avg_valence: Option<f64>,

    /// Emotional arousal in [0, 1], when known
    #[serde(default)]
    pub avg_arousal: Option<f64>,

    #[serde(default)]
    pub last_emotion: Option<String>,
}

/// Probability of default, clamped to `[0, 1]` and rounded to 3 decimals
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RiskScore(f64);

impl RiskScore {
    /// Clamp and round a raw model output. NaN maps to the neutral 0.5.
    pub fn new(raw: f64) -> Self {
        if raw.is_nan() {
            return Self(0.5);
        }
        let clamped = raw.clamp(0.0, 1.0);
        Self((clamped * 1000.0).round() / 1000.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Errors a risk model can return
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Model request timed out")]
    Timeout,

    #[error("Model connection failed: {0}")]
    Connection(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Invalid features: {0}")]
    InvalidFeatures(String),
}

impl Classify for ModelError {
    fn error_class(&self) -> ErrorClass {
        match self {
            ModelError::Timeout => ErrorClass::Timeout,
            ModelError::Connection(_) => ErrorClass::Connection,
            ModelError::Unavailable(_) => ErrorClass::Unavailable,
            ModelError::Prediction(_) => ErrorClass::Internal,
            ModelError::InvalidFeatures(_) => ErrorClass::InvalidInput,
        }
    }
}

/// Remote or in-process risk model
#[async_trait]
pub trait RiskModel: Send + Sync {
    async fn score(&self, features: &RiskFeatures) -> Result<RiskScore, ModelError>;

    /// Version string reported with primary results
    fn version(&self) -> &str;
}
