//! HTTP Route Handlers
//!
//! Thin shells over `AdmissionService`: read the raw body, resolve the
//! client identity, delegate, and shape the JSON response.

use crate::auth::client_identity;
use crate::error::to_response;
use crate::server::AppState;
use crate::types::{AsyncResponse, HealthResponse, StatusResponse, SyncResponse};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use powq_core::application::admission::parse_body;
use powq_core::application::AdmissionError;
use powq_core::domain::round_ms;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::debug;

fn read_json(state: &AppState, body: Result<Bytes, BytesRejection>) -> Result<Value, AdmissionError> {
    let limits = state.admission.limits();
    match body {
        Ok(bytes) => parse_body(&bytes, limits),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(
            AdmissionError::Validation(format!("Request body exceeds {} bytes.", limits.max_body_bytes)),
        ),
        Err(rejection) => Err(AdmissionError::Validation(rejection.body_text())),
    }
}

fn peer_addr(connect_info: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    connect_info.map(|ConnectInfo(addr)| addr)
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.service_name.clone(),
        timestamp: state.time_provider.now_millis(),
    })
}

/// POST /api/sync
pub async fn submit_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    let payload = match read_json(&state, body) {
        Ok(payload) => payload,
        Err(e) => return to_response(e),
    };
    let identity = client_identity(&headers, peer_addr(connect_info));

    match state.admission.submit_sync(&identity, &payload).await {
        Ok(results) => {
            let total_ms = round_ms(started.elapsed().as_secs_f64() * 1000.0);
            debug!(count = results.len(), total_ms, "Sync batch computed");
            Json(SyncResponse { results, total_ms }).into_response()
        }
        Err(e) => to_response(e),
    }
}

/// POST /api/async
pub async fn submit_async(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match read_json(&state, body) {
        Ok(payload) => payload,
        Err(e) => return to_response(e),
    };
    let identity = client_identity(&headers, peer_addr(connect_info));

    match state.admission.submit_async(&identity, &payload).await {
        Ok(acks) => Json(AsyncResponse { acks }).into_response(),
        Err(e) => to_response(e),
    }
}

/// POST /api/async/status
pub async fn async_status(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match read_json(&state, body) {
        Ok(payload) => payload,
        Err(e) => return to_response(e),
    };

    match state.admission.status(&payload).await {
        Ok(results) => Json(StatusResponse { results }).into_response(),
        Err(e) => to_response(e),
    }
}
