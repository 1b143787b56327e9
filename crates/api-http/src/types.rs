//! HTTP Response Types

use powq_core::application::admission::{Ack, SyncResult};
use powq_core::domain::JobSnapshot;
use serde::{Deserialize, Serialize};

/// GET /api/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// Epoch ms
    pub timestamp: i64,
}

/// POST /api/sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub results: Vec<SyncResult>,
    pub total_ms: f64,
}

/// POST /api/async
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResponse {
    pub acks: Vec<Ack>,
}

/// POST /api/async/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub results: Vec<JobSnapshot>,
}
