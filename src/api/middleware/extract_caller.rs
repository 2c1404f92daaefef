//! Caller extraction from request headers.
//!
//! Token issuance and validation live in front of this service; by the time a
//! request arrives the gateway has already resolved the caller and forwards
//! the identity and role as plain headers.

use axum::http::{HeaderMap, StatusCode};

use crate::api::server_config::{CALLER_ID_HEADER, CALLER_ROLE_HEADER};
use crate::api::types::{api_error, ApiError};
use crate::core::caller::{Caller, Role};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Caller from `x-caller-id` / `x-caller-role`, or 401 when either is missing.
pub fn extract_caller(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let (Some(identity), Some(role)) = (header(headers, CALLER_ID_HEADER), header(headers, CALLER_ROLE_HEADER)) else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: caller identity and role are required",
            "AUTH_REQUIRED",
        ));
    };
    let role: Role = role.parse()?;
    tracing::debug!("Caller resolved: {} ({})", identity, role);
    Ok(Caller::new(identity, role))
}
