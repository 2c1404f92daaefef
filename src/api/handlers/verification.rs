//! Public verification handlers. No caller headers required.

use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::api::types::ApiError;
use crate::service::{CertificateAnalysis, CertificatePortal};
use crate::verification::VerificationOutcome;

/// GET /api/verify/:code
pub async fn verify_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    Path(code): Path<String>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    Ok(Json(portal.verify(&code)?))
}

/// POST /api/verify/:code/analysis
pub async fn analyze_certificate(
    State(portal): State<Arc<CertificatePortal>>,
    Path(code): Path<String>,
) -> Result<Json<CertificateAnalysis>, ApiError> {
    Ok(Json(portal.analyze(&code)?))
}
