// Crash recovery logic
use crate::application::worker::constants::DEFAULT_VISIBILITY_TIMEOUT;
use crate::domain::JobState;
use crate::error::Result;
use crate::port::{JobQueue, JobStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Crash recovery service
///
/// Detects reservations whose worker disappeared (no ack within the
/// visibility timeout) and makes those jobs available again.
pub struct RecoveryService {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn JobStore>,
    visibility_timeout: Duration,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Work queue holding the in-flight reservations
    /// * `store` - Job store
    /// * `visibility_timeout` - Optional custom timeout (default: 5 minutes)
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(queue, store, None);
    /// recovery.recover_orphaned_jobs().await?;
    /// ```
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn JobStore>,
        visibility_timeout: Option<Duration>,
    ) -> Self {
        Self {
            queue,
            store,
            visibility_timeout: visibility_timeout.unwrap_or(DEFAULT_VISIBILITY_TIMEOUT),
        }
    }

    /// Recover orphaned jobs
    ///
    /// Algorithm:
    /// 1. Return reservations older than the visibility timeout to the head of the queue
    /// 2. Reset each redelivered job still recorded as RUNNING back to QUEUED
    ///    (jobs in any other state are left alone; the worker sorts them out on reserve)
    ///
    /// # Returns
    /// Number of jobs redelivered
    pub async fn recover_orphaned_jobs(&self) -> Result<usize> {
        let redelivered = self.queue.requeue_stale(self.visibility_timeout).await?;
        if redelivered.is_empty() {
            return Ok(0);
        }

        for job_id in &redelivered {
            let Some(mut job) = self.store.find_by_id(job_id).await? else {
                warn!(job_id = %job_id, "Redelivered job has no record");
                continue;
            };

            if job.state == JobState::Running {
                job.release_orphaned()?;
                self.store.update(&job).await?;
                info!(job_id = %job.id, attempts = job.attempts, "Orphaned job requeued after recovery");
            }
        }

        info!(
            recovered_count = redelivered.len(),
            visibility_timeout_secs = self.visibility_timeout.as_secs(),
            "Orphaned job recovery complete"
        );
        Ok(redelivered.len())
    }
}
