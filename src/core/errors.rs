//! Portal-wide error taxonomy.
//!
//! Every operation on [`crate::service::CertificatePortal`] returns [`PortalError`].
//! Lower layers (storage, anomaly detection) keep their own error enums and
//! convert into this one at the service boundary.

use thiserror::Error;

use crate::anomaly_detection::AnomalyDetectionError;
use crate::storage::StorageError;

/// Message returned for every failed code lookup, whatever the cause.
pub const INVALID_CODE_MESSAGE: &str = "Invalid or used verification code";

/// Custom error type for portal operations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Missing or malformed required input. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// External certificate id already used by a non-revoked record.
    #[error("Duplicate external certificate id: {0}")]
    DuplicateExternalId(String),

    /// Lookup miss. The message never says which part of the lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller role or identity does not permit the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Persistence collaborator failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Detector training failure.
    #[error("Anomaly detection error: {0}")]
    Anomaly(#[from] AnomalyDetectionError),
}

/// Portal result type.
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// The generic lookup failure used by verify and download.
    pub fn invalid_code() -> Self {
        PortalError::NotFound(INVALID_CODE_MESSAGE.to_string())
    }

    /// Stable machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "VALIDATION_ERROR",
            PortalError::DuplicateExternalId(_) => "DUPLICATE_EXTERNAL_ID",
            PortalError::NotFound(_) => "NOT_FOUND",
            PortalError::Forbidden(_) => "FORBIDDEN",
            PortalError::Storage(_) => "STORAGE_ERROR",
            PortalError::Configuration(_) => "CONFIGURATION_ERROR",
            PortalError::Anomaly(_) => "ANOMALY_DETECTION_ERROR",
        }
    }

    /// Errors the caller caused and can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PortalError::Validation(_)
                | PortalError::DuplicateExternalId(_)
                | PortalError::NotFound(_)
                | PortalError::Forbidden(_)
        )
    }
}

impl From<StorageError> for PortalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateExternalId(id) => PortalError::DuplicateExternalId(id),
            other => PortalError::Storage(other.to_string()),
        }
    }
}
