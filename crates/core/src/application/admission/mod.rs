// Admission Service - accept/reject decisions and the three client use cases

pub mod enqueue;
pub mod sync;
pub mod validate;

pub use enqueue::Ack;
pub use sync::SyncResult;
pub use validate::{constant_time_eq, parse_body, SubmitBatch};

use crate::application::backpressure::BackpressureGate;
use crate::application::rate_limit::{RateLimitDecision, RateLimiter};
use crate::domain::JobSnapshot;
use crate::error::AppError;
use crate::port::{Compute, CounterStore, IdProvider, JobQueue, JobStore, TimeProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Client-facing admission failures
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded. Retry in {retry_after_secs}s.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Server is busy. Retry in {retry_after_secs}s.")]
    Overloaded { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for AdmissionError {
    fn from(err: AppError) -> Self {
        AdmissionError::Internal(err.to_string())
    }
}

/// Request-size and content bounds, checked before any queue interaction
#[derive(Debug, Clone)]
pub struct AdmissionLimits {
    pub max_seeds: usize,
    pub max_seed_len: usize,
    pub max_body_bytes: usize,
    pub max_difficulty: u32,
    pub max_status_ids: usize,
    pub max_callback_url_len: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_seeds: 100,
            max_seed_len: 1024,
            max_body_bytes: 65_536,
            max_difficulty: 100,
            max_status_ids: 500,
            max_callback_url_len: 2048,
        }
    }
}

/// Admission control knobs
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub limits: AdmissionLimits,
    /// Requests allowed per identity per window
    pub rate_limit: u64,
    pub rate_window: Duration,
    pub backpressure_threshold: usize,
    /// `Retry-After` sent with backpressure rejections
    pub overload_retry_after_secs: u64,
    /// Upper bound on each counter-store / queue-depth call
    pub store_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limits: AdmissionLimits::default(),
            rate_limit: 60,
            rate_window: Duration::from_secs(60),
            backpressure_threshold: 1000,
            overload_retry_after_secs: 5,
            store_timeout: Duration::from_millis(250),
        }
    }
}

/// Admission Service
///
/// Order of checks: validation, rate limit, backpressure (async only), enqueue.
/// Shared-secret authentication happens in the transport before any of these.
pub struct AdmissionService {
    rate_limiter: RateLimiter,
    gate: BackpressureGate,
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    compute: Arc<dyn Compute>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: AdmissionConfig,
}

impl AdmissionService {
    pub fn new(
        counter_store: Arc<dyn CounterStore>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn JobStore>,
        compute: Arc<dyn Compute>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(counter_store, config.store_timeout),
            gate: BackpressureGate::new(
                Arc::clone(&queue),
                config.backpressure_threshold,
                config.store_timeout,
            ),
            store,
            queue,
            compute,
            id_provider,
            time_provider,
            config,
        }
    }

    pub fn limits(&self) -> &AdmissionLimits {
        &self.config.limits
    }

    async fn enforce_rate_limit(&self, identity: &str) -> Result<(), AdmissionError> {
        match self
            .rate_limiter
            .check_and_consume(identity, self.config.rate_limit, self.config.rate_window)
            .await
        {
            RateLimitDecision::Limited { retry_after_secs } => {
                debug!(identity = %identity, retry_after_secs, "Admission rejected by rate limit");
                Err(AdmissionError::RateLimited { retry_after_secs })
            }
            RateLimitDecision::Allowed { .. } | RateLimitDecision::FailOpen => Ok(()),
        }
    }

    /// Compute every seed inline and return the results
    pub async fn submit_sync(
        &self,
        identity: &str,
        payload: &Value,
    ) -> Result<Vec<SyncResult>, AdmissionError> {
        let batch = validate::parse_submit(payload, &self.config.limits, false)?;
        self.enforce_rate_limit(identity).await?;

        Ok(sync::execute(self.compute.as_ref(), self.time_provider.as_ref(), &batch).await)
    }

    /// Enqueue one job per seed and acknowledge immediately
    pub async fn submit_async(
        &self,
        identity: &str,
        payload: &Value,
    ) -> Result<Vec<Ack>, AdmissionError> {
        let batch = validate::parse_submit(payload, &self.config.limits, true)?;
        self.enforce_rate_limit(identity).await?;

        if self.gate.should_reject().await {
            warn!(
                threshold = self.gate.threshold(),
                "Admission rejected by backpressure"
            );
            return Err(AdmissionError::Overloaded {
                retry_after_secs: self.config.overload_retry_after_secs.max(1),
            });
        }

        let acks = enqueue::execute(
            self.store.as_ref(),
            self.queue.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            batch,
        )
        .await?;
        Ok(acks)
    }

    /// Snapshot per requested id; unknown or expired ids get a neutral snapshot
    pub async fn status(&self, payload: &Value) -> Result<Vec<JobSnapshot>, AdmissionError> {
        let ids = validate::parse_status(payload, &self.config.limits)?;
        debug!(count = ids.len(), "Async status lookup");

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            let snapshot = match self.store.find_by_id(&id).await? {
                Some(job) => JobSnapshot::from(&job),
                None => JobSnapshot::unknown(id),
            };
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}
