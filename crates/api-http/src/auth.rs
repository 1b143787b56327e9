//! Shared-secret check and client identity

use crate::error::to_response;
use crate::server::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use powq_core::application::admission::constant_time_eq;
use powq_core::application::AdmissionError;
use std::net::SocketAddr;

pub const SECRET_HEADER: &str = "x-admission-secret";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reject the request with 401 unless it carries the configured secret.
/// A no-op when no secret is configured.
pub async fn require_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.admission_secret.as_deref() {
        let provided = header_str(req.headers(), SECRET_HEADER).unwrap_or_default();
        if !constant_time_eq(provided, expected) {
            return to_response(AdmissionError::Unauthorized);
        }
    }
    next.run(req).await
}

/// Rate-limit identity: API key, else first forwarded-for hop, else peer IP
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        return format!("key:{}", key);
    }
    if let Some(ip) = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return format!("ip:{}", ip);
    }
    match peer {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}
