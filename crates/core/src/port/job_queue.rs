// Job Queue Port (Interface)
// Single logical FIFO queue with late acknowledgement

use crate::domain::JobId;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A queue item handed to exactly one worker
///
/// The item stays in the queue's in-flight set until [`JobQueue::ack`] is
/// called, so a worker that dies before acknowledging leaves it recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub job_id: JobId,
    /// Epoch ms at which the worker took the item
    pub reserved_at: i64,
}

/// Durable work queue feeding the worker pool
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to the tail of the ready list (admission order = FIFO order)
    async fn enqueue(&self, job_id: &JobId) -> Result<()>;

    /// Park a job until `ready_at` (epoch ms); it becomes ready again afterwards.
    /// Used for compute retries, the entry never leaves the durable queue.
    async fn enqueue_delayed(&self, job_id: &JobId, ready_at: i64) -> Result<()>;

    /// Take the head of the ready list, promoting any due delayed entries first.
    /// Returns `None` when nothing is ready. Never blocks.
    async fn reserve(&self) -> Result<Option<Reservation>>;

    /// Remove a reserved item for good (late acknowledgement)
    async fn ack(&self, reservation: &Reservation) -> Result<()>;

    /// Return reservations older than `older_than` to the head of the ready list.
    ///
    /// # Returns
    /// IDs of the redelivered jobs
    async fn requeue_stale(&self, older_than: Duration) -> Result<Vec<JobId>>;

    /// Number of ready (not delayed, not in-flight) items
    async fn depth(&self) -> Result<usize>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;

    /// Queue whose depth cannot be read (backend down)
    pub struct UnavailableJobQueue;

    #[async_trait]
    impl JobQueue for UnavailableJobQueue {
        async fn enqueue(&self, _job_id: &JobId) -> Result<()> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
        async fn enqueue_delayed(&self, _job_id: &JobId, _ready_at: i64) -> Result<()> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
        async fn reserve(&self) -> Result<Option<Reservation>> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
        async fn ack(&self, _reservation: &Reservation) -> Result<()> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
        async fn requeue_stale(&self, _older_than: Duration) -> Result<Vec<JobId>> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
        async fn depth(&self) -> Result<usize> {
            Err(AppError::Queue("broker unavailable".to_string()))
        }
    }
}
