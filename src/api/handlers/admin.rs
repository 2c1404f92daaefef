//! Admin dashboard handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use crate::api::middleware::extract_caller;
use crate::api::types::ApiError;
use crate::service::{AnalyticsSummary, AnomalyReport, CertificatePortal};

/// GET /api/admin/anomalies
pub async fn anomaly_report(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
) -> Result<Json<AnomalyReport>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.anomaly_report(&caller)?))
}

/// GET /api/admin/analytics
pub async fn analytics_summary(
    State(portal): State<Arc<CertificatePortal>>,
    headers: HeaderMap,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let caller = extract_caller(&headers)?;
    Ok(Json(portal.analytics_summary(&caller)?))
}
