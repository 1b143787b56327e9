// Webhook delivery
//
// Each delivery is its own task with its own retry loop. It shares nothing
// with the worker that spawned it beyond the job store. Tasks are tracked so
// shutdown can wait for them and settle the ones it has to abandon.

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{CallbackAttempt, CallbackRecord, CallbackStatus, JobId};
use crate::port::{CallbackSender, DeliveryError, JobStore, TimeProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct CallbackDelivery {
    sender: Arc<dyn CallbackSender>,
    store: Arc<dyn JobStore>,
    time_provider: Arc<dyn TimeProvider>,
    policy: RetryPolicy<DeliveryError>,
    timeout: Duration,
    tasks: Mutex<JoinSet<CallbackRecord>>,
    /// Latest record of every delivery that has not settled yet
    pending: Mutex<HashMap<JobId, CallbackRecord>>,
}

impl CallbackDelivery {
    pub fn new(
        sender: Arc<dyn CallbackSender>,
        store: Arc<dyn JobStore>,
        time_provider: Arc<dyn TimeProvider>,
        policy: RetryPolicy<DeliveryError>,
        timeout: Duration,
    ) -> Self {
        Self {
            sender,
            store,
            time_provider,
            policy,
            timeout,
            tasks: Mutex::new(JoinSet::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start delivery in the background and return immediately.
    ///
    /// `completed_at` is the job's completion time (epoch ms), used for `callback_time_ms`.
    pub fn deliver(self: &Arc<Self>, attempt: CallbackAttempt, completed_at: i64) {
        let this = Arc::clone(self);
        let mut tasks = self.tasks();
        // reap finished deliveries so the set only holds live ones
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { this.run(attempt, completed_at).await });
    }

    /// Number of deliveries that have not reached a final outcome
    pub fn in_flight(&self) -> usize {
        self.pending_records().len()
    }

    /// Wait up to `timeout` for running deliveries to settle.
    ///
    /// Deliveries still retrying after that are aborted and recorded as
    /// failed, so no record is left `pending`. Returns how many were abandoned.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks());
        let settled = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if settled.is_err() {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let abandoned: Vec<(JobId, CallbackRecord)> = self.pending_records().drain().collect();
        let count = abandoned.len();
        for (job_id, mut record) in abandoned {
            record.status = CallbackStatus::Failed;
            record.last_error = Some(match record.last_error.take() {
                Some(last) => format!("abandoned at shutdown: {}", last),
                None => "abandoned at shutdown".to_string(),
            });
            self.persist(&job_id, &record).await;

            error!(
                job_id = %job_id,
                attempts = record.attempts,
                "Callback delivery abandoned at shutdown"
            );
        }
        count
    }

    /// Retry loop; resolves once the delivery is delivered or permanently failed
    pub async fn run(&self, mut attempt: CallbackAttempt, completed_at: i64) -> CallbackRecord {
        let body = attempt.body();
        let mut record = CallbackRecord::pending();
        self.persist(&attempt.job_id, &record).await;

        loop {
            record.attempts += 1;

            match self.sender.post_json(&attempt.url, &body, self.timeout).await {
                Ok(()) => {
                    let elapsed = (self.time_provider.now_millis() - completed_at).max(0);
                    record.status = CallbackStatus::Delivered;
                    record.last_error = None;
                    record.callback_time_ms = Some(elapsed as f64);
                    self.persist(&attempt.job_id, &record).await;

                    info!(
                        job_id = %attempt.job_id,
                        url = %attempt.url,
                        attempts = record.attempts,
                        callback_time_ms = elapsed,
                        "Callback delivered"
                    );
                    return record;
                }
                Err(e) => {
                    record.last_error = Some(e.to_string());

                    match self.policy.decide(attempt.retry_count, &e) {
                        RetryDecision::Retry(delay) => {
                            attempt.retry_count += 1;
                            attempt.next_retry_at =
                                Some(self.time_provider.now_millis() + delay.as_millis() as i64);
                            self.persist(&attempt.job_id, &record).await;

                            warn!(
                                job_id = %attempt.job_id,
                                attempt = record.attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "Callback attempt failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::Exhausted | RetryDecision::NotRetryable => {
                            record.status = CallbackStatus::Failed;
                            self.persist(&attempt.job_id, &record).await;

                            error!(
                                job_id = %attempt.job_id,
                                url = %attempt.url,
                                attempts = record.attempts,
                                error = %e,
                                "Callback delivery failed permanently"
                            );
                            return record;
                        }
                    }
                }
            }
        }
    }

    async fn persist(&self, job_id: &JobId, record: &CallbackRecord) {
        {
            let mut pending = self.pending_records();
            if record.status == CallbackStatus::Pending {
                pending.insert(job_id.clone(), record.clone());
            } else {
                pending.remove(job_id);
            }
        }
        if let Err(e) = self.store.record_callback(job_id, record).await {
            warn!(job_id = %job_id, error = %e, "Failed to record callback progress");
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<CallbackRecord>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_records(&self) -> MutexGuard<'_, HashMap<JobId, CallbackRecord>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
