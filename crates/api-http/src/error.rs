//! HTTP Error Mapping
//!
//! Maps admission errors to status codes and a `{error}` JSON body.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use powq_core::application::AdmissionError;
use serde_json::json;
use tracing::error;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

fn with_retry_after(mut response: Response, secs: u64) -> Response {
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
    response
}

/// Convert AdmissionError to an HTTP response
pub fn to_response(err: AdmissionError) -> Response {
    let message = err.to_string();
    match err {
        AdmissionError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, message),
        AdmissionError::Validation(_) => json_error(StatusCode::BAD_REQUEST, message),
        AdmissionError::RateLimited { retry_after_secs } => with_retry_after(
            json_error(StatusCode::TOO_MANY_REQUESTS, message),
            retry_after_secs,
        ),
        AdmissionError::Overloaded { retry_after_secs } => with_retry_after(
            json_error(StatusCode::SERVICE_UNAVAILABLE, message),
            retry_after_secs,
        ),
        AdmissionError::Internal(detail) => {
            error!(error = %detail, "Request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_headers() {
        let resp = to_response(AdmissionError::RateLimited { retry_after_secs: 42 });
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");

        let resp = to_response(AdmissionError::Overloaded { retry_after_secs: 0 });
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(to_response(AdmissionError::Unauthorized).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            to_response(AdmissionError::Validation("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            to_response(AdmissionError::Internal("redis down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
