/*!
 * Fallback scoring policies
 */

use super::{RiskFeatures, RiskScore};

/// Local substitute for the risk model.
///
/// Implementations must be pure, total and fast: the protected service calls
/// them inline on the request path and never expects an error.
pub trait FallbackPolicy: Send + Sync {
    fn score(&self, features: &RiskFeatures) -> RiskScore;

    /// Version string reported with fallback results
    fn version(&self) -> &str;
}

/// Emotions that push the fallback score up
const HIGH_RISK_EMOTIONS: [&str; 4] = ["anger", "fear", "sadness", "stress"];

/// Emotions that pull the fallback score down
const LOW_RISK_EMOTIONS: [&str; 4] = ["joy", "contentment", "calm", "confident"];

/// Deterministic rule-based credit risk assessment
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedFallback;

impl RuleBasedFallback {
    pub const VERSION: &'static str = "fallback_v1.0";

    /// Starting point before any rule applies
    pub const BASE_SCORE: f64 = 0.4;

    fn transaction_volume(features: &RiskFeatures) -> f64 {
        match features.transaction_count {
            0 => 0.3,
            1..=4 => 0.2,
            n if n > 100 => -0.1,
            _ => 0.0,
        }
    }

    fn utilization(features: &RiskFeatures) -> f64 {
        let limit = features.current_credit_limit;
        let amount = features.avg_transaction_amount;
        if amount > limit * 0.8 {
            0.2
        } else if amount < limit * 0.3 {
            -0.1
        } else {
            0.0
        }
    }

    fn credit_limit(features: &RiskFeatures) -> f64 {
        let limit = features.current_credit_limit;
        if limit > 100_000.0 {
            -0.1
        } else if limit < 10_000.0 {
            0.1
        } else {
            0.0
        }
    }

    fn emotional_state(features: &RiskFeatures) -> f64 {
        let (Some(valence), Some(arousal)) = (features.avg_valence, features.avg_arousal) else {
            return 0.0;
        };

        if valence < -0.3 && arousal > 0.7 {
            0.2
        } else if valence > 0.3 && (0.3..=0.7).contains(&arousal) {
            -0.1
        } else {
            0.0
        }
    }

    fn last_emotion(features: &RiskFeatures) -> f64 {
        let Some(emotion) = features.last_emotion.as_deref() else {
            return 0.0;
        };
        let emotion = emotion.trim().to_ascii_lowercase();

        if HIGH_RISK_EMOTIONS.contains(&emotion.as_str()) {
            0.15
        } else if LOW_RISK_EMOTIONS.contains(&emotion.as_str()) {
            -0.1
        } else {
            0.0
        }
    }
}

impl FallbackPolicy for RuleBasedFallback {
    fn score(&self, features: &RiskFeatures) -> RiskScore {
        let raw = Self::BASE_SCORE
            + Self::transaction_volume(features)
            + Self::utilization(features)
            + Self::credit_limit(features)
            + Self::emotional_state(features)
            + Self::last_emotion(features);

        RiskScore::new(raw)
    }

    fn version(&self) -> &str {
        Self::VERSION
    }
}
