//! Breaker registry: one circuit breaker per named dependency
//!
//! The registry is an ordinary value, built once at startup and shared via
//! `Arc` with every call site and with the monitoring surface. Breakers are
//! created lazily on first request and live as long as the registry.
//!
//! # Example
//!
//! ```
//! use riskguard_core_resilience::{BreakerRegistry, CircuitBreakerConfig};
//!
//! let registry = BreakerRegistry::new();
//! let first = registry.get_or_create("ml_model_service", CircuitBreakerConfig::default());
//! let again = registry.get_or_create("ml_model_service", CircuitBreakerConfig::default());
//!
//! assert_eq!(registry.len(), 1);
//! assert_eq!(first.name(), again.name());
//! ```

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-scoped map of breaker name to breaker
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    clock: Arc<dyn Clock>,
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create an empty registry using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry whose breakers share `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            breakers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the breaker registered under `name`, creating it with `config`
    /// if this is the first request for that name.
    ///
    /// `config` is ignored when the breaker already exists. Construction
    /// happens under the write lock, so racing callers never build two.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = name, "Registering circuit breaker");
                CircuitBreaker::with_clock(name, config, Arc::clone(&self.clock))
            })
            .clone()
    }

    /// Find a breaker by name
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        breakers.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = breakers.keys().cloned().collect();
        names.sort();
        names
    }

    /// All breakers, sorted by name
    pub fn breakers(&self) -> Vec<CircuitBreaker> {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<CircuitBreaker> = breakers.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Number of registered breakers
    pub fn len(&self) -> usize {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been registered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
