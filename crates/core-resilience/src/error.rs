//! Error types for the resilience crate
//!
//! Two families live here:
//! - [`BreakerError`]: what a guarded call returns (blocked, timed out, or the
//!   operation's own error passed through untouched)
//! - [`ResilienceError`]: failures of the control surface (unknown breaker
//!   names, invalid configuration)

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BreakerError<E> {
    /// Breaker is open (or a probe is already in flight); the operation was not invoked
    #[error("Circuit breaker '{name}' is open, rejecting requests")]
    CircuitOpen { name: String },

    /// Operation exceeded the configured call timeout
    #[error("Circuit breaker '{name}': operation timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// Error produced by the operation itself
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True if the call was short-circuited without invoking the operation
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    /// True if the breaker enforced its call timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Borrow the operation's error, if that is what this is
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from the registry and monitoring surface
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// Monitoring operation referenced a breaker that was never registered
    #[error("Circuit breaker '{0}' not found")]
    UnknownBreaker(String),

    /// Configuration rejected by validation
    #[error("Invalid circuit breaker configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_error_predicates() {
        let open: BreakerError<String> = BreakerError::CircuitOpen {
            name: "ml".to_string(),
        };
        assert!(open.is_circuit_open());
        assert!(!open.is_timeout());
        assert!(open.operation_error().is_none());

        let timeout: BreakerError<String> = BreakerError::Timeout {
            name: "ml".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(timeout.is_timeout());

        let op = BreakerError::Operation("boom".to_string());
        assert_eq!(op.operation_error().map(String::as_str), Some("boom"));
        assert_eq!(op.to_string(), "boom");
    }

    #[test]
    fn test_unknown_breaker_message() {
        let err = ResilienceError::UnknownBreaker("payments".to_string());
        assert_eq!(err.to_string(), "Circuit breaker 'payments' not found");
    }
}
