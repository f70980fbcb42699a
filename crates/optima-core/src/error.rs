//! Error types for optimization sessions.
//!
//! This module defines the error taxonomy shared by every crate in the
//! workspace. Configuration problems are reported eagerly through
//! [`OptimizerError::InvalidArgument`] and
//! [`OptimizerError::UnsupportedOperation`]; numerical trouble inside a run is
//! reported through [`OptimizerError::Failure`] and
//! [`OptimizerError::RoundoffLimited`] and later converted into a result status.

use thiserror::Error;

/// Errors that can occur while configuring or running an optimization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Invalid configuration or argument.
    ///
    /// Raised by setters on shape mismatches and by `optimize` when the
    /// configuration as a whole is inconsistent (e.g. a lower bound above
    /// the corresponding upper bound).
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument
        reason: String,
    },

    /// The selected algorithm cannot handle the configured problem.
    ///
    /// Raised at optimize-start, before any evaluation, for example when a
    /// gradient-based algorithm is paired with a gradient-free objective or a
    /// bounds-only algorithm is given equality constraints.
    #[error("Unsupported operation: {reason}")]
    UnsupportedOperation {
        /// Description of the capability mismatch
        reason: String,
    },

    /// Allocation failure.
    #[error("Out of memory")]
    OutOfMemory,

    /// Generic algorithm-internal failure.
    #[error("Optimization failed: {reason}")]
    Failure {
        /// Description of the failure
        reason: String,
    },

    /// Numerical precision exhausted before any other criterion was met.
    #[error("Roundoff errors limited progress: {reason}")]
    RoundoffLimited {
        /// Description of where precision ran out
        reason: String,
    },

    /// A user callback reported an error.
    ///
    /// The run is aborted and reported with a `Failure` status.
    #[error("Evaluation callback failed: {reason}")]
    Evaluation {
        /// Message returned by the callback
        reason: String,
    },

    /// An evaluation was refused because a stopping criterion already holds.
    ///
    /// This is an unwinding signal used by the driver loop; it never escapes
    /// `optimize`.
    #[error("Evaluation refused: a stopping criterion is satisfied")]
    Halted,
}

impl OptimizerError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument<S: Into<String>>(reason: S) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::UnsupportedOperation {
            reason: reason.into(),
        }
    }

    /// Create a Failure error.
    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    /// Create a RoundoffLimited error.
    pub fn roundoff<S: Into<String>>(reason: S) -> Self {
        Self::RoundoffLimited {
            reason: reason.into(),
        }
    }

    /// Create an Evaluation error from a callback message.
    pub fn evaluation<S: Into<String>>(reason: S) -> Self {
        Self::Evaluation {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        Self::invalid_argument(format!(
            "{what} has length {actual}, expected {expected}"
        ))
    }

    /// Returns true for errors detected before the first evaluation.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::UnsupportedOperation { .. }
        )
    }
}

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OptimizerError::invalid_argument("lower bound exceeds upper bound");
        assert!(matches!(err, OptimizerError::InvalidArgument { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid argument: lower bound exceeds upper bound"
        );

        let err = OptimizerError::dimension_mismatch("lower bounds", 3, 2);
        assert_eq!(
            err.to_string(),
            "Invalid argument: lower bounds has length 2, expected 3"
        );
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            OptimizerError::invalid_argument("bad"),
            OptimizerError::unsupported("no gradient"),
            OptimizerError::OutOfMemory,
            OptimizerError::failure("line search"),
            OptimizerError::roundoff("simplex collapsed"),
            OptimizerError::evaluation("callback threw"),
            OptimizerError::Halted,
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_configuration_errors() {
        assert!(OptimizerError::invalid_argument("x").is_configuration_error());
        assert!(OptimizerError::unsupported("x").is_configuration_error());
        assert!(!OptimizerError::failure("x").is_configuration_error());
        assert!(!OptimizerError::Halted.is_configuration_error());
    }
}
