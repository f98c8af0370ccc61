//! Error type shared by all evaluation routines.
//!
//! Every failure is fatal for the workflow that hits it. Nothing in this
//! crate retries, coerces or silently skips inconsistent input.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// Two series that must be aligned point by point differ in length.
    #[error("Length mismatch: '{left}' has {left_len} values, '{right}' has {right_len}")]
    LengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    #[error("Series '{0}' is empty")]
    EmptySeries(String),

    #[error("Index of '{name}' is not strictly increasing at position {position}")]
    NonMonotonicIndex { name: String, position: usize },

    /// A column identifier that the configured vocabulary cannot place.
    #[error("Unrecognized identifier '{identifier}': {reason}")]
    UnrecognizedIdentifier { identifier: String, reason: String },

    #[error(
        "Demand response imbalance for cluster '{cluster}': \
         shifted down {shift_down:.3}, shifted up {shift_up:.3}"
    )]
    DemandResponseImbalance {
        cluster: String,
        shift_down: f64,
        shift_up: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl EvalError {
    pub fn missing_column(column: &str, source_name: &str) -> Self {
        EvalError::MissingColumn {
            column: column.to_string(),
            source_name: source_name.to_string(),
        }
    }

    pub fn unrecognized(identifier: &str, reason: impl Into<String>) -> Self {
        EvalError::UnrecognizedIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}
