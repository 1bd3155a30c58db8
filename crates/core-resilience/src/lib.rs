//! RiskGuard Core Resilience: pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! Building blocks for calling an unreliable dependency without letting its
//! failures cascade:
//!
//! - **Circuit Breaker**: fails fast while a dependency is unhealthy and probes
//!   for recovery one call at a time
//! - **Failure Classifier**: decides which error classes count against a breaker
//! - **Metrics**: per-breaker counters, rolling failure window and transition log
//! - **Registry**: one breaker per named dependency, created on first use
//! - **Health**: 0-100 score, status bucket and advisories from breaker metrics
//! - **Monitor**: name-addressed queries and manual overrides for operators
//!
//! # Key Principles
//!
//! This crate knows nothing about the dependency it protects. It never
//! retries and never produces fallback values; callers decide what to do
//! with a [`BreakerError`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ get_or_create(name)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Breaker Registry                  │  ← one breaker per name
//! └─────────────┬───────────────────────────┘
//!               │ execute(op)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← fail-fast protection
//! │  (classifier, call timeout, probe slot) │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         Protected dependency
//!
//!  Alongside:
//!   Metrics Recorder → Health Report → Breaker Monitor
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use riskguard_core_resilience::prelude::*;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ModelDown;
//!
//! impl Classify for ModelDown {
//!     fn error_class(&self) -> ErrorClass {
//!         ErrorClass::Unavailable
//!     }
//! }
//!
//! # async fn example() -> Result<(), BreakerError<ModelDown>> {
//! let registry = BreakerRegistry::new();
//! let breaker = registry.get_or_create(
//!     "ml_model_service",
//!     CircuitBreakerConfig {
//!         failure_threshold: 3,
//!         recovery_timeout: Duration::from_secs(30),
//!         ..Default::default()
//!     },
//! );
//!
//! let score = breaker
//!     .execute(|| async { Ok::<_, ModelDown>(0.42) })
//!     .await?;
//!
//! let monitor = BreakerMonitor::new(registry);
//! println!("score {} health {:?}", score, monitor.health("ml_model_service"));
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod classifier;
pub mod clock;
pub mod error;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod registry;

// Re-export main types for convenience
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use classifier::{Classify, ErrorClass, FailureClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BreakerError, ResilienceError};
pub use health::{Advisory, HealthInputs, HealthReport, HealthStatus};
pub use metrics::{CallOutcome, MetricsRecorder, MetricsSnapshot, TransitionEvent};
pub use monitor::{BreakerMonitor, BreakerOverview, BreakerStatus};
pub use registry::BreakerRegistry;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use riskguard_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::classifier::{Classify, ErrorClass, FailureClassifier};
    pub use super::clock::{Clock, ManualClock, SystemClock};
    pub use super::error::{BreakerError, ResilienceError};
    pub use super::health::{HealthReport, HealthStatus};
    pub use super::metrics::MetricsSnapshot;
    pub use super::monitor::BreakerMonitor;
    pub use super::registry::BreakerRegistry;
}
