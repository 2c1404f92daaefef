//! 异常检测error类型

use thiserror::Error;

/// Anomaly detection errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnomalyDetectionError {
    /// Too few records to train a forest. Expected before the threshold is reached.
    #[error("Insufficient training data: {available} of {required} records")]
    InsufficientData { required: usize, available: usize },

    /// Training set rejected; the previously installed forest stays active.
    #[error("Invalid training data: {0}")]
    InvalidTrainingData(String),

    /// Vector length differs from the forest's training dimension.
    #[error("Feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Anomaly detection result type
pub type Result<T> = std::result::Result<T, AnomalyDetectionError>;

impl AnomalyDetectionError {
    /// The normal pre-threshold state, not a fault.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
