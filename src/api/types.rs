//! Request and response bodies for the portal API.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::PortalError;
use crate::core::record::CertificateSubmission;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        let status = match &err {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::DuplicateExternalId(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            PortalError::NotFound(msg) | PortalError::Validation(msg) | PortalError::Forbidden(msg) => msg.clone(),
            _ if err.is_client_error() => err.to_string(),
            _ => {
                // Detail stays in the log; it may name files on the host.
                tracing::error!("Request failed: {}", err);
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        };
        api_error(status, message, err.code())
    }
}

/// Upload body. The file itself is stored elsewhere; only its reference arrives here.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCertificateRequest {
    #[serde(flatten)]
    pub submission: CertificateSubmission,
    #[serde(default, alias = "filePath")]
    pub file_ref: Option<String>,
}

/// Bulk upload body: one entry per certificate, same shape as a single upload.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct BulkUploadRequest {
    #[serde(default)]
    pub certificates: Vec<SubmitCertificateRequest>,
}

impl BulkUploadRequest {
    pub fn into_rows(self) -> Vec<(CertificateSubmission, Option<String>)> {
        self.certificates
            .into_iter()
            .map(|c| (c.submission, c.file_ref))
            .collect()
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub evidence_ref: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub certificate_id: String,
    pub file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_server_errors_hide_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/var/lib/portal/certs.json");
        let err: PortalError = StorageError::Io(io).into();
        let (status, Json(body)) = ApiError::from(err);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, INTERNAL_ERROR_MESSAGE);
        assert_eq!(body.code, "STORAGE_ERROR");
        assert!(!body.error.contains("/var/lib"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let (status, Json(body)) = ApiError::from(PortalError::DuplicateExternalId("X1".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.error.contains("X1"));

        let (status, Json(body)) = ApiError::from(PortalError::Validation("Issuer is required".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Issuer is required");
    }
}
