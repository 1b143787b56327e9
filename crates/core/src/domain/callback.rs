// Webhook delivery model

use crate::domain::job::JobId;
use serde::{Deserialize, Serialize};

/// Delivery state of a job's webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Pending,
    Delivered,
    Failed,
}

impl std::fmt::Display for CallbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackStatus::Pending => write!(f, "pending"),
            CallbackStatus::Delivered => write!(f, "delivered"),
            CallbackStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Delivery progress persisted alongside the job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackRecord {
    pub status: CallbackStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Job completion to successful delivery
    pub callback_time_ms: Option<f64>,
}

impl CallbackRecord {
    pub fn pending() -> Self {
        Self {
            status: CallbackStatus::Pending,
            attempts: 0,
            last_error: None,
            callback_time_ms: None,
        }
    }
}

/// Transient in-flight delivery; lives only as long as its retry loop
#[derive(Debug, Clone)]
pub struct CallbackAttempt {
    pub url: String,
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub retry_count: u32,
    /// Epoch ms of the next POST; `None` before the first one
    pub next_retry_at: Option<i64>,
}

impl CallbackAttempt {
    pub fn new(url: impl Into<String>, job_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            job_id: job_id.into(),
            payload,
            retry_count: 0,
            next_retry_at: None,
        }
    }

    /// Wire body: `{requestId, result}`
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "requestId": self.job_id,
            "result": self.payload,
        })
    }
}
