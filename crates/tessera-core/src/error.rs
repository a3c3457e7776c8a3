//! Error type shared by every layer of the engine.
//!
//! Variants fall into the groups callers need to tell apart:
//!
//! - **Validation**: a computation was described with an invalid parameter
//!   combination. Raised at construction, never deferred to evaluation.
//! - **Unsupported**: the receiver does not offer the requested capability
//!   (`into_destination` on a plain evaluable, `and_then` on a base factor).
//! - **Structural**: cycles in a computation tree or a delegation chain.
//! - **Capacity**: a bounded buffer is full. Recoverable by the caller.
//! - **Signature / compilation / execution**: mismatches between a compiled
//!   kernel and the arguments it is given, undefined symbols in the IR, and
//!   faults raised while a kernel runs.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while describing, optimizing, compiling or evaluating computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid construction parameters.
    #[error("invalid {what}: {reason}")]
    Validation {
        /// Name of the rejected parameter or computation.
        what: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The operation is not offered by this implementation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A computation tree references one of its own ancestors.
    #[error("cycle detected at node '{0}'")]
    CycleDetected(String),

    /// A delegation chain loops back onto itself.
    #[error("circular delegation detected at '{0}'")]
    CircularDelegation(String),

    /// A set-once delegate was assigned twice.
    #[error("delegate of '{0}' is already set")]
    DelegateAlreadySet(String),

    /// A bounded buffer has no space left.
    #[error("{0} is full")]
    Full(String),

    /// Wrong number of positional arguments.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Arguments declared by the compiled signature.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },

    /// A positional argument has an incompatible length.
    #[error("argument {index} has {actual} elements, expected {expected}")]
    ArgumentSize {
        /// Position of the argument (usize::MAX for a destination buffer).
        index: usize,
        /// Required element count.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },

    /// A call names a function that no scope defines.
    #[error("call to undefined function '{0}'")]
    UndefinedFunction(String),

    /// An expression references an undeclared variable or array.
    #[error("reference to undefined symbol '{0}'")]
    UndefinedSymbol(String),

    /// A call passes the wrong kind or number of arguments.
    #[error("invalid call to '{function}': {reason}")]
    InvalidCall {
        /// Callee name.
        function: String,
        /// What was wrong with the call.
        reason: String,
    },

    /// A fault raised while a compiled kernel runs.
    #[error("kernel execution failed: {0}")]
    Execution(String),
}

impl Error {
    /// Builds a [`Error::Validation`] error.
    pub fn validation(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::Unsupported`] error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Builds an [`Error::Execution`] error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Whether the error signals a missing capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Whether the error was raised by construction-time validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether the error describes a malformed graph.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected(_) | Self::CircularDelegation(_) | Self::DelegateAlreadySet(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = Error::validation("window size", "must be at least 2");
        assert_eq!(err.to_string(), "invalid window size: must be at least 2");
        assert!(err.is_validation());
        assert!(!err.is_unsupported());
    }

    #[test]
    fn test_argument_count_display() {
        let err = Error::ArgumentCount {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "expected 2 arguments, got 3");
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::CycleDetected("a".into()).is_structural());
        assert!(Error::CircularDelegation("a".into()).is_structural());
        assert!(!Error::Full("series".into()).is_structural());
        assert_eq!(Error::Full("series".into()).to_string(), "series is full");
    }
}
