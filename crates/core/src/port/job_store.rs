// Job Store Port (Interface)

use crate::domain::{CallbackRecord, Job, JobId};
use crate::error::Result;
use async_trait::async_trait;

/// Per-job state and result storage
///
/// Records of terminal jobs are kept for a retention window after completion;
/// past it `find_by_id` returns `None`, exactly as for an id never seen.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a freshly admitted job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID (`None` if unknown or expired)
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Overwrite the job record. Writing a terminal state starts its retention clock.
    async fn update(&self, job: &Job) -> Result<()>;

    /// Attach webhook delivery progress without touching the rest of the record.
    /// A no-op for records that already expired.
    async fn record_callback(&self, id: &JobId, record: &CallbackRecord) -> Result<()>;

    /// Drop expired records
    ///
    /// # Returns
    /// Number of records removed (stores with native key expiry may report 0)
    async fn purge_expired(&self) -> Result<u64>;
}
