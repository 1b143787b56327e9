//! HTTP Server
//!
//! Router assembly and the serve loop. The shared-secret middleware is
//! layered on the submit routes only; health and status stay open.
//! CORS wraps everything so preflights never reach the secret check.

use crate::auth::{require_secret, API_KEY_HEADER, SECRET_HEADER};
use crate::handler;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use powq_core::application::AdmissionService;
use powq_core::port::TimeProvider;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SERVICE_NAME: &str = "powq";

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub service_name: String,
    /// Required value of `X-Admission-Secret` on submit routes; `None` disables the check
    pub admission_secret: Option<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            admission_secret: None,
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionService>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub service_name: String,
    pub admission_secret: Option<String>,
}

/// Browser clients call the API from another origin
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(SECRET_HEADER),
        ])
}

/// Build the `/api` router
pub fn build_router(state: AppState) -> Router {
    // One byte of slack so oversize bodies reach parse_body's own check
    let body_limit = state.admission.limits().max_body_bytes.saturating_add(1);

    let submit = Router::new()
        .route("/api/sync", post(handler::submit_sync))
        .route("/api/async", post(handler::submit_async))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/api/health", get(handler::health))
        .route("/api/async/status", post(handler::async_status))
        .merge(submit)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .with_state(state)
}

/// HTTP Server
pub struct ApiServer {
    config: ApiServerConfig,
    admission: Arc<AdmissionService>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        admission: Arc<AdmissionService>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            admission,
            time_provider,
        }
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            admission: Arc::clone(&self.admission),
            time_provider: Arc::clone(&self.time_provider),
            service_name: self.config.service_name.clone(),
            admission_secret: self.config.admission_secret.clone(),
        })
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), String>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| format!("Failed to bind {}: {}", self.config.bind_addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))?;

        info!(
            addr = %local_addr,
            secret_required = self.config.admission_secret.is_some(),
            "Starting HTTP server"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| format!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
