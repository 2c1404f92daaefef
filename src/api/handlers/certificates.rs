//! Upload, revoke, report, download and listing handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::sync::Arc;

use crate::api::middleware::extract_caller;
use crate::api::types::{ApiError, BulkUploadRequest, DownloadResponse, ReportRequest, SubmitCertificateRequest};
use crate::core::record::{CertificateRecord, CertificateReport};
use crate::service::{BatchOutcome, CertificatePortal, SubmissionOutcome};

/// POST /api/certificates
pub async fn submit_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
    Json(req): Json<SubmitCertificateRequest>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), ApiError> {
    let caller = extract_caller(&headers)?;
    let outcome = portal.submit_certificate(&caller, req.submission, req.file_ref.as_deref())?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/institution/bulk-upload
///
/// Answers 200 with a per-row report even when some rows are rejected.
pub async fn bulk_upload(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
    Json(req): Json<BulkUploadRequest>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.submit_batch(&caller, req.into_rows())?))
}

/// POST /api/certificates/:id/revoke
pub async fn revoke_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CertificateRecord>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.revoke(&caller, &id)?))
}

/// POST /api/certificates/:id/reports
///
/// Public: `id` may be the record id or the issuer's certificate id.
pub async fn report_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<CertificateReport>), ApiError> {
    let report = portal.report(&id, &req.reason, req.evidence_ref.as_deref())?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/certificates/:id/download
pub async fn download_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let caller = extract_caller(&headers)?;
    let file_path = portal.download_reference(&caller, &id)?;
    Ok(Json(DownloadResponse {
        certificate_id: id,
        file_path,
    }))
}

/// GET /api/students/:nin/certificates
pub async fn student_certificates(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
    Path(nin): Path<String>,
) -> Result<Json<Vec<CertificateRecord>>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.list_for_subject(&caller, &nin)?))
}

/// GET /api/institution/certificates
pub async fn institution_certificates(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CertificateRecord>>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.list_for_issuer(&caller)?))
}
