//! Error types for the estimators

use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),
}

impl ModelError {
    pub(crate) fn invalid(name: &str, value: impl ToString, reason: &str) -> Self {
        ModelError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Check that `x` has one row per target and at least one row.
pub(crate) fn check_xy(n_rows: usize, n_targets: usize) -> Result<()> {
    if n_rows != n_targets {
        return Err(ModelError::ShapeError {
            expected: format!("y length = {n_rows}"),
            actual: format!("y length = {n_targets}"),
        });
    }
    if n_rows == 0 {
        return Err(ModelError::EmptyInput("no training rows".to_string()));
    }
    Ok(())
}

/// Check that prediction input has the feature count the model was fitted on.
pub(crate) fn check_features(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ModelError::ShapeError {
            expected: format!("{expected} features"),
            actual: format!("{actual} features"),
        });
    }
    Ok(())
}
