//! HTTP API Layer
//!
//! Admission endpoints (sync, async, status) and health over axum.

pub mod auth;
pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{build_router, ApiServer, ApiServerConfig, AppState};
