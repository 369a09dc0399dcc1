//! Error types for the churn harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Main error type for the harness.
///
/// `DataIntegrity` and `ConfigError` are fatal to a run. `ConvergenceFailure`
/// is recorded per grid-search unit, and `MetricUndefined` only surfaces when a
/// caller demands a number from a metric that has none.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Data integrity error in column '{column}': {reason}")]
    DataIntegrity { column: String, reason: String },

    #[error("Insufficient minority samples: {available} available, at least {required} required")]
    InsufficientMinoritySamples { available: usize, required: usize },

    #[error("Configuration error for '{key}': {reason}")]
    ConfigError { key: String, reason: String },

    #[error("Convergence failure in {model}: {reason}")]
    ConvergenceFailure { model: String, reason: String },

    #[error("Metric '{metric}' is undefined: {reason}")]
    MetricUndefined { metric: String, reason: String },

    #[error("Grid search cancelled after {completed_units} completed units")]
    Cancelled { completed_units: usize },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HarnessError {
    /// Shorthand for a data-integrity error on a named column
    pub fn data_integrity(column: impl Into<String>, reason: impl Into<String>) -> Self {
        HarnessError::DataIntegrity {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration error on a named key
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        HarnessError::ConfigError {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HarnessError::ConvergenceFailure { .. } | HarnessError::MetricUndefined { .. }
        )
    }
}

impl From<polars::error::PolarsError> for HarnessError {
    fn from(err: polars::error::PolarsError) -> Self {
        HarnessError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for HarnessError {
    fn from(err: ndarray::ShapeError) -> Self {
        HarnessError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
