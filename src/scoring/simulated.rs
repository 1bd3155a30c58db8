/*!
 * In-process stand-in for the remote risk model
 *
 * Used by the CLI drills and by tests that need a model which fails on
 * demand. Failures are drawn from a seeded RNG so runs are reproducible.
 */

use super::{ModelError, RiskFeatures, RiskModel, RiskScore};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Version reported by the simulated model
pub const SIMULATED_MODEL_VERSION: &str = "v1.0.0";

/// How the simulated model misbehaves
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationProfile {
    /// Probability that a call fails (0.0 - 1.0)
    pub failure_rate: f64,
    /// Time every call takes before answering
    pub latency: Duration,
    pub seed: u64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::from_millis(20),
            seed: 42,
        }
    }
}

/// Risk model with injectable outages, latency and random failures
#[derive(Debug)]
pub struct SimulatedModel {
    profile: SimulationProfile,
    rng: Mutex<StdRng>,
    outage: AtomicBool,
    calls: AtomicU64,
}

impl SimulatedModel {
    pub fn new(profile: SimulationProfile) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(profile.seed)),
            outage: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            profile,
        }
    }

    /// Model that always answers after `latency`
    pub fn healthy(latency: Duration) -> Self {
        Self::new(SimulationProfile {
            latency,
            ..Default::default()
        })
    }

    /// Start or stop a full outage; every call fails while it lasts
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
        tracing::info!(outage = down, "Simulated model outage toggled");
    }

    /// Number of times `score` was invoked
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Draw the failure roll and the score noise under one lock
    fn roll(&self) -> (f64, f64) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (rng.random::<f64>(), rng.random_range(-0.05..0.05))
    }

    fn validate(features: &RiskFeatures) -> Result<(), ModelError> {
        if features.current_credit_limit < 0.0 {
            return Err(ModelError::InvalidFeatures(
                "current_credit_limit must not be negative".to_string(),
            ));
        }
        if features.avg_transaction_amount < 0.0 {
            return Err(ModelError::InvalidFeatures(
                "avg_transaction_amount must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Logistic blend of utilization, history and mood
    fn predict(features: &RiskFeatures, noise: f64) -> f64 {
        let utilization = if features.current_credit_limit > 0.0 {
            (features.avg_transaction_amount / features.current_credit_limit).min(2.0)
        } else {
            1.0
        };
        let history = (features.transaction_count as f64 + 1.0).ln();
        let mood = features.avg_valence.unwrap_or(0.0) * features.avg_arousal.unwrap_or(0.5);

        let logit = 1.5 * utilization - 0.35 * history - 0.8 * mood;
        1.0 / (1.0 + (-logit).exp()) + noise
    }
}

#[async_trait]
impl RiskModel for SimulatedModel {
    async fn score(&self, features: &RiskFeatures) -> Result<RiskScore, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Self::validate(features)?;

        tokio::time::sleep(self.profile.latency).await;

        if self.outage.load(Ordering::SeqCst) {
            return Err(ModelError::Unavailable("model endpoint down".to_string()));
        }

        let (roll, noise) = self.roll();
        if roll < self.profile.failure_rate {
            return Err(ModelError::Connection("connection reset by peer".to_string()));
        }

        Ok(RiskScore::new(Self::predict(features, noise)))
    }

    fn version(&self) -> &str {
        SIMULATED_MODEL_VERSION
    }
}
