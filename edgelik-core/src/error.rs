//! Structured error types for edge likelihood evaluation.

use thiserror::Error;

/// Unified error type for all edgelik operations.
///
/// Every variant describes a boundary precondition violation detected before
/// any likelihood is computed. Numeric degeneracies (a site likelihood of
/// zero, giving `-inf`) are results, not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EdgelikError {
    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A buffer does not have the length its declared shape requires.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An index into a table points past its end.
    #[error("{what} index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        bound: usize,
    },
}

impl EdgelikError {
    /// Shorthand for a [`EdgelikError::DimensionMismatch`] check.
    pub fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Self::DimensionMismatch {
                what,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Convenience alias used throughout the edgelik crates.
pub type Result<T> = std::result::Result<T, EdgelikError>;
