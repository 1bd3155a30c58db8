//! Failure classification
//!
//! Decides which operation errors count against a breaker. Errors describe
//! themselves through [`Classify`]; the breaker's [`FailureClassifier`] holds
//! the set of [`ErrorClass`]es that qualify. Anything outside the set is
//! passed back to the caller without touching breaker counters.
//!
//! # Example
//!
//! ```
//! use riskguard_core_resilience::classifier::{ErrorClass, FailureClassifier};
//!
//! let classifier = FailureClassifier::default();
//! assert!(classifier.is_qualifying(ErrorClass::Timeout));
//! assert!(!classifier.is_qualifying(ErrorClass::InvalidInput));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of an operation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The dependency did not answer in time
    Timeout,
    /// The dependency could not be reached
    Connection,
    /// The dependency answered but reported itself unavailable
    Unavailable,
    /// The dependency failed while handling a well-formed request
    Internal,
    /// The caller sent something the dependency rejects
    InvalidInput,
}

impl ErrorClass {
    /// All classes, in declaration order
    pub const ALL: [ErrorClass; 5] = [
        ErrorClass::Timeout,
        ErrorClass::Connection,
        ErrorClass::Unavailable,
        ErrorClass::Internal,
        ErrorClass::InvalidInput,
    ];
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::Connection => "connection",
            ErrorClass::Unavailable => "unavailable",
            ErrorClass::Internal => "internal",
            ErrorClass::InvalidInput => "invalid_input",
        };
        f.write_str(s)
    }
}

/// Implemented by error types that can pass through a circuit breaker
pub trait Classify {
    fn error_class(&self) -> ErrorClass;
}

/// Predicate over [`ErrorClass`]: which errors count as breaker failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClassifier {
    qualifying: Vec<ErrorClass>,
}

impl Default for FailureClassifier {
    /// Everything except caller input errors
    fn default() -> Self {
        Self::only([
            ErrorClass::Timeout,
            ErrorClass::Connection,
            ErrorClass::Unavailable,
            ErrorClass::Internal,
        ])
    }
}

impl FailureClassifier {
    /// Qualify exactly the given classes
    pub fn only(classes: impl IntoIterator<Item = ErrorClass>) -> Self {
        let mut qualifying: Vec<ErrorClass> = classes.into_iter().collect();
        qualifying.sort();
        qualifying.dedup();
        Self { qualifying }
    }

    /// Every error counts against the breaker
    pub fn all() -> Self {
        Self::only(ErrorClass::ALL)
    }

    /// Check whether an error class counts against the breaker
    pub fn is_qualifying(&self, class: ErrorClass) -> bool {
        self.qualifying.contains(&class)
    }

    /// Classify a concrete error
    pub fn qualifies<E: Classify + ?Sized>(&self, error: &E) -> bool {
        self.is_qualifying(error.error_class())
    }

    /// The qualifying classes, sorted
    pub fn classes(&self) -> &[ErrorClass] {
        &self.qualifying
    }
}
