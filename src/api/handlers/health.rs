//! 健康check

use axum::extract::State;
use serde_json::json;
use std::sync::Arc;

use crate::service::CertificatePortal;

/// 健康check
pub async fn health_check(State(portal): State<Arc<CertificatePortal>>) -> axum::response::Json<serde_json::Value> {
    axum::response::Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "detectorStatus": portal.detector_status(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
