//! Error types shared by every algorithm in the crate.
//!
//! Configuration problems and violated preconditions are fatal for the call that hit them:
//! nothing is retried and no partial state is committed.

use thiserror::Error;

/// Errors raised by the HTM core.
#[derive(Error, Debug)]
pub enum HtmError {
    /// A configuration value is missing, out of range or contradicts another one.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The Spatial Pooler received an input vector of the wrong length.
    #[error("input vector has {actual} bits, expected {expected}")]
    InputLengthMismatch {
        /// Number of inputs the pooler was configured for.
        expected: usize,
        /// Length of the vector that was passed in.
        actual: usize,
    },

    /// The Temporal Memory received an active column outside the column space.
    #[error("active column {column} out of range (num columns: {num_columns})")]
    ColumnOutOfRange {
        /// The offending column index.
        column: usize,
        /// Number of columns in the region.
        num_columns: usize,
    },

    /// An internal invariant does not hold, usually because of an unsatisfiable configuration.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Encoding or decoding persisted state failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] bincode::Error),
}

impl HtmError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Result alias using [`HtmError`].
pub type Result<T> = std::result::Result<T, HtmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = HtmError::invalid("potential_pct", "must be in (0, 1]");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'potential_pct': must be in (0, 1]"
        );

        let err = HtmError::InputLengthMismatch {
            expected: 10,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 10"));
    }
}
