// Worker - Job execution loop

pub mod constants;
mod pool;
mod shutdown;

use constants::*;
pub use pool::{WorkerPool, WorkerPoolHandle};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::callback::CallbackDelivery;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{round_ms, CallbackAttempt, Job, JobResult, JobSnapshot, JobState};
use crate::error::Result;
use crate::port::{Compute, ComputeError, JobQueue, JobStore, Reservation, TimeProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything a worker needs, shared by every worker of a pool
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn JobStore>,
    pub compute: Arc<dyn Compute>,
    pub retry_policy: Arc<RetryPolicy<ComputeError>>,
    /// `None` disables webhook delivery
    pub callbacks: Option<Arc<CallbackDelivery>>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Worker processes jobs from the shared queue
pub struct Worker {
    id: usize,
    ctx: WorkerContext,
}

impl Worker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run worker loop with graceful shutdown support.
    ///
    /// A job already started runs to completion; shutdown is only observed between jobs.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = self.id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker_id = self.id, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    if shutdown.sleep_or_shutdown(IDLE_SLEEP_DURATION).await {
                        debug!(worker_id = self.id, "Worker interrupted during idle");
                        break;
                    }
                }
                Err(e) => {
                    error!(worker_id = self.id, error = %e, "Worker error");
                    if shutdown
                        .sleep_or_shutdown(ERROR_RECOVERY_SLEEP_DURATION)
                        .await
                    {
                        debug!(worker_id = self.id, "Worker interrupted during error recovery");
                        break;
                    }
                }
            }
        }
        info!(worker_id = self.id, "Worker stopped");
        Ok(())
    }

    /// Process next job from queue (returns true if a reservation was handled).
    ///
    /// The store is always written before the reservation is acknowledged; an
    /// error in between leaves the reservation in flight for recovery to redeliver.
    pub async fn process_next_job(&self) -> Result<bool> {
        let reservation = match self.ctx.queue.reserve().await? {
            Some(r) => r,
            None => return Ok(false),
        };

        let mut job = match self.ctx.store.find_by_id(&reservation.job_id).await? {
            Some(job) => job,
            None => {
                warn!(job_id = %reservation.job_id, "Reserved job has no record, dropping");
                self.ctx.queue.ack(&reservation).await?;
                return Ok(true);
            }
        };

        if job.state.is_terminal() {
            info!(job_id = %job.id, state = %job.state, "Duplicate delivery of finished job, acknowledging");
            self.ctx.queue.ack(&reservation).await?;
            return Ok(true);
        }

        match job.state {
            JobState::Retrying => job.requeue()?,
            // redelivered while the store still shows the previous owner
            JobState::Running => job.release_orphaned()?,
            _ => {}
        }

        job.start(self.ctx.time_provider.now_millis())?;
        self.ctx.store.update(&job).await?;

        debug!(
            worker_id = self.id,
            job_id = %job.id,
            attempt = job.attempts,
            "Processing job"
        );

        // Panic isolation: a panicking compute fails the job, not the worker
        let compute = Arc::clone(&self.ctx.compute);
        let request = job.request.clone();
        let wall_start = Instant::now();
        let handle = tokio::task::spawn(async move {
            compute
                .compute(&request.seed, request.difficulty, request.algorithm)
                .await
        });
        let execution_result = handle.await;
        let wall_ms = round_ms(wall_start.elapsed().as_secs_f64() * 1000.0);
        let now = self.ctx.time_provider.now_millis();

        match execution_result {
            Ok(Ok(output)) => {
                job.complete(
                    now,
                    JobResult {
                        hash: output.hash,
                        nonce: output.nonce,
                        processing_time_ms: round_ms(output.elapsed.as_secs_f64() * 1000.0),
                        wall_time_ms: wall_ms,
                    },
                )?;
                self.ctx.store.update(&job).await?;

                info!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    processing_ms = wall_ms,
                    queue_wait_ms = job.queue_time_ms().unwrap_or_default(),
                    total_ms = job.total_time_ms().unwrap_or_default(),
                    "Job completed"
                );

                // Before the ack: a redelivered done job is skipped above, so
                // this is the only chance to start delivery
                self.schedule_callback(&job);
                self.ctx.queue.ack(&reservation).await?;
            }
            Ok(Err(e)) => {
                let retries_so_far = job.attempts.saturating_sub(1);
                match self.ctx.retry_policy.decide(retries_so_far, &e) {
                    RetryDecision::Retry(delay) => {
                        let delay_ms = delay.as_millis() as i64;
                        job.schedule_retry(e.to_string())?;
                        self.ctx.store.update(&job).await?;
                        self.ctx.queue.enqueue_delayed(&job.id, now + delay_ms).await?;
                        self.ctx.queue.ack(&reservation).await?;

                        info!(
                            job_id = %job.id,
                            attempt = job.attempts,
                            delay_ms,
                            error = %e,
                            "Retrying job after transient failure"
                        );
                    }
                    RetryDecision::Exhausted => {
                        let reason = format!("{} (gave up after {} attempts)", e, job.attempts);
                        self.fail(&mut job, &reservation, now, reason).await?;
                    }
                    RetryDecision::NotRetryable => {
                        self.fail(&mut job, &reservation, now, e.to_string()).await?;
                    }
                }
            }
            Err(join_err) => {
                // Panicked or cancelled: never retried
                let reason = if join_err.is_panic() {
                    "compute panicked".to_string()
                } else {
                    "compute task cancelled".to_string()
                };
                self.fail(&mut job, &reservation, now, reason).await?;
            }
        }
        Ok(true)
    }

    async fn fail(
        &self,
        job: &mut Job,
        reservation: &Reservation,
        now: i64,
        reason: String,
    ) -> Result<()> {
        error!(job_id = %job.id, attempts = job.attempts, error = %reason, "Job failed");
        job.fail(now, reason)?;
        self.ctx.store.update(job).await?;
        self.ctx.queue.ack(reservation).await?;
        Ok(())
    }

    fn schedule_callback(&self, job: &Job) {
        let (Some(callbacks), Some(url)) = (&self.ctx.callbacks, &job.request.callback_url) else {
            return;
        };
        let payload = match serde_json::to_value(JobSnapshot::from(job)) {
            Ok(v) => v,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to serialize callback payload");
                return;
            }
        };
        let completed_at = job.completed_at.unwrap_or(job.enqueued_at);
        // outcome is recorded on the job and logged
        callbacks.deliver(CallbackAttempt::new(url.clone(), job.id.clone(), payload), completed_at);
    }
}
