// In-memory job records with post-completion retention

use async_trait::async_trait;
use powq_core::domain::{CallbackRecord, Job, JobId};
use powq_core::error::Result;
use powq_core::port::{JobStore, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct StoredJob {
    job: Job,
    /// Set once the job is terminal
    expires_at: Option<i64>,
}

impl StoredJob {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, StoredJob>>,
    retention: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryJobStore {
    pub fn new(retention: Duration, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            retention,
            time_provider,
        }
    }

    fn expiry_for(&self, job: &Job) -> Option<i64> {
        job.state
            .is_terminal()
            .then(|| self.time_provider.now_millis() + self.retention.as_millis() as i64)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let stored = StoredJob {
            job: job.clone(),
            expires_at: self.expiry_for(job),
        };
        self.jobs.lock().await.insert(job.id.clone(), stored);
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .get(id)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.job.clone()))
    }

    async fn update(&self, job: &Job) -> Result<()> {
        self.insert(job).await
    }

    async fn record_callback(&self, id: &JobId, record: &CallbackRecord) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut jobs = self.jobs.lock().await;
        if let Some(stored) = jobs.get_mut(id).filter(|stored| !stored.is_expired(now)) {
            stored.job.callback = Some(record.clone());
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, stored| !stored.is_expired(now));
        Ok((before - jobs.len()) as u64)
    }
}
