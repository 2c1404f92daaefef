use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::{limit::ConcurrencyLimitLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::handlers;
use crate::api::server_config::*;
use crate::core::errors::PortalError;
use crate::service::CertificatePortal;

#[derive(Clone)]
pub struct PortalServer {
    pub portal: Arc<CertificatePortal>,
    pub host: String,
    pub port: u16,
    pub cors_allow_origin: String,
}

impl PortalServer {
    pub fn new(portal: Arc<CertificatePortal>) -> Self {
        let server = &portal.config().server;
        Self {
            host: server.host.clone(),
            port: server.port,
            cors_allow_origin: server.cors_allow_origin.clone(),
            portal,
        }
    }

    fn cors_layer(&self) -> Result<CorsLayer, PortalError> {
        let parse = |origin: &str| {
            HeaderValue::from_str(origin)
                .map_err(|_| PortalError::Configuration(format!("Invalid CORS origin: {}", origin)))
        };
        let origins = self
            .cors_allow_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse)
            .collect::<Result<Vec<HeaderValue>, _>>()?;

        tracing::info!("CORS configured to allow origin: {}", self.cors_allow_origin);
        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::ORIGIN,
                HeaderName::from_static(CALLER_ID_HEADER),
                HeaderName::from_static(CALLER_ROLE_HEADER),
            ])
            .expose_headers([header::CONTENT_TYPE])
            .max_age(CORS_MAX_AGE))
    }

    pub fn create_router(&self) -> Result<Router, PortalError> {
        let cors = self.cors_layer()?;

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/api/health", get(handlers::health_check))
            .route("/api/certificates", post(handlers::submit_certificate))
            .route("/api/certificates/:id/revoke", post(handlers::revoke_certificate))
            .route("/api/certificates/:id/reports", post(handlers::report_certificate))
            .route("/api/certificates/:id/download", get(handlers::download_certificate))
            .route("/api/students/:nin/certificates", get(handlers::student_certificates))
            .route("/api/institution/certificates", get(handlers::institution_certificates))
            .route("/api/institution/bulk-upload", post(handlers::bulk_upload))
            .route("/api/verify/:code", get(handlers::verify_certificate))
            .route("/api/verify/:code/analysis", post(handlers::analyze_certificate))
            .route("/api/admin/anomalies", get(handlers::anomaly_report))
            .route("/api/admin/analytics", get(handlers::analytics_summary))
            .layer(
                ServiceBuilder::new()
                    // Convert middleware errors (timeout/overload) into HTTP responses
                    .layer(HandleErrorLayer::new(|err: BoxError| async move {
                        if err.is::<tower::timeout::error::Elapsed>() {
                            (StatusCode::REQUEST_TIMEOUT, "request timed out")
                        } else {
                            (StatusCode::SERVICE_UNAVAILABLE, "service overloaded")
                        }
                    }))
                    .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENCY))
                    .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
                    .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                    .layer(TraceLayer::new_for_http()),
            )
            .layer(cors)
            .with_state(self.portal.clone());

        Ok(router)
    }

    pub async fn start(self) -> Result<(), anyhow::Error> {
        let app = self.create_router()?;
        let addr = format!("{}:{}", self.host, self.port);
        tracing::info!("🚀 Certificate portal listening on {}", addr);
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
