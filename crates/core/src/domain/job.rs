// Job Domain Model

use crate::domain::algorithm::HashAlgorithm;
use crate::domain::callback::CallbackRecord;
use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4, the external request handle)
pub type JobId = String;

/// Job State
///
/// `queued -> running -> {done, failed, retrying -> queued}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Retrying,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Retrying => "retrying",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable admission input, owned by the job until it is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub seed: String,
    pub difficulty: u32,
    pub algorithm: HashAlgorithm,
    pub callback_url: Option<String>,
}

/// Output of a successful compute attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub hash: String,
    pub nonce: u64,
    pub processing_time_ms: f64,
    pub wall_time_ms: f64,
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub state: JobState,

    /// Number of compute attempts started (1 on the first run)
    pub attempts: u32,

    pub enqueued_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    pub result: Option<JobResult>,
    pub last_error: Option<String>,

    /// Webhook delivery progress, present once delivery has been scheduled
    pub callback: Option<CallbackRecord>,
}

impl Job {
    /// Create a new queued job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `enqueued_at` - Admission timestamp in epoch ms (injected, not system time)
    /// * `request` - Normalized admission input
    pub fn new(id: impl Into<String>, enqueued_at: i64, request: JobRequest) -> Self {
        Self {
            id: id.into(),
            request,
            state: JobState::Queued,
            attempts: 0,
            enqueued_at,
            started_at: None,
            completed_at: None,
            result: None,
            last_error: None,
            callback: None,
        }
    }

    /// Create a test job with a deterministic ID (test-1, test-2, ...)
    ///
    /// **Note**: production code injects ID and time via providers.
    pub fn new_test(seed: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            (counter * 1000) as i64,
            JobRequest {
                seed: seed.into(),
                difficulty: 1,
                algorithm: HashAlgorithm::default(),
                callback_url: None,
            },
        )
    }

    fn transition_error(&self, to: JobState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    /// Transition to Running and count the attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(self.transition_error(JobState::Running));
        }
        self.state = JobState::Running;
        self.attempts += 1;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Done with the computed result attached
    pub fn complete(&mut self, now_millis: i64, result: JobResult) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Done));
        }
        self.state = JobState::Done;
        self.completed_at = Some(now_millis);
        self.result = Some(result);
        self.last_error = None;
        Ok(())
    }

    /// Transition to Failed (terminal)
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Failed));
        }
        self.state = JobState::Failed;
        self.completed_at = Some(now_millis);
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Park a failed attempt until its backoff elapses
    pub fn schedule_retry(&mut self, error: impl Into<String>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Retrying));
        }
        self.state = JobState::Retrying;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Retrying -> Queued once the delayed entry has been picked up again
    pub fn requeue(&mut self) -> Result<()> {
        if self.state != JobState::Retrying {
            return Err(self.transition_error(JobState::Queued));
        }
        self.state = JobState::Queued;
        self.started_at = None;
        Ok(())
    }

    /// Running -> Queued for a job whose worker disappeared mid-flight.
    ///
    /// The attempt that was in progress is not refunded.
    pub fn release_orphaned(&mut self) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Queued));
        }
        self.state = JobState::Queued;
        self.started_at = None;
        Ok(())
    }

    /// Enqueue-to-start wait of the most recent attempt
    pub fn queue_time_ms(&self) -> Option<i64> {
        self.started_at.map(|s| (s - self.enqueued_at).max(0))
    }

    /// Enqueue-to-completion time
    pub fn total_time_ms(&self) -> Option<i64> {
        self.completed_at.map(|c| (c - self.enqueued_at).max(0))
    }
}

/// Externalized view of a job for polling clients and webhook payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub request_id: JobId,
    pub status: JobState,
    pub attempts: u32,
    pub seed: Option<String>,
    pub algorithm: Option<HashAlgorithm>,
    pub difficulty: Option<u32>,
    pub hash: Option<String>,
    pub nonce: Option<u64>,
    pub error: Option<String>,
    pub processing_time_ms: Option<f64>,
    pub wall_time_ms: Option<f64>,
    pub queue_time_ms: Option<f64>,
    pub total_time_ms: Option<f64>,
    pub enqueued_at_ms: Option<i64>,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub callback_status: Option<String>,
    pub callback_attempts: Option<u32>,
    pub callback_time_ms: Option<f64>,
}

impl JobSnapshot {
    /// Neutral answer for ids that are unknown or past their retention window
    pub fn unknown(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: JobState::Queued,
            attempts: 1,
            seed: None,
            algorithm: None,
            difficulty: None,
            hash: None,
            nonce: None,
            error: None,
            processing_time_ms: None,
            wall_time_ms: None,
            queue_time_ms: None,
            total_time_ms: None,
            enqueued_at_ms: None,
            started_at_ms: None,
            completed_at_ms: None,
            callback_status: None,
            callback_attempts: None,
            callback_time_ms: None,
        }
    }
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        let result = job.result.as_ref();
        let callback = job.callback.as_ref();
        Self {
            request_id: job.id.clone(),
            status: job.state,
            attempts: job.attempts.max(1),
            seed: Some(job.request.seed.clone()),
            algorithm: Some(job.request.algorithm),
            difficulty: Some(job.request.difficulty),
            hash: result.map(|r| r.hash.clone()),
            nonce: result.map(|r| r.nonce),
            error: job.last_error.clone(),
            processing_time_ms: result.map(|r| r.processing_time_ms),
            wall_time_ms: result.map(|r| r.wall_time_ms),
            queue_time_ms: job.queue_time_ms().map(|ms| ms as f64),
            total_time_ms: job.total_time_ms().map(|ms| ms as f64),
            enqueued_at_ms: Some(job.enqueued_at),
            started_at_ms: job.started_at,
            completed_at_ms: job.completed_at,
            callback_status: callback.map(|c| c.status.to_string()),
            callback_attempts: callback.map(|c| c.attempts),
            callback_time_ms: callback.and_then(|c| c.callback_time_ms),
        }
    }
}

/// Round a millisecond measurement to two decimals
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> JobResult {
        JobResult {
            hash: "ab".repeat(32),
            nonce: 50_000,
            processing_time_ms: 12.5,
            wall_time_ms: 12.5,
        }
    }

    #[test]
    fn test_job_lifecycle_done() {
        let mut job = Job::new_test("a");
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempts, 0);

        job.start(job.enqueued_at + 40).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.queue_time_ms(), Some(40));

        job.complete(job.enqueued_at + 100, result()).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert!(job.state.is_terminal());
        assert_eq!(job.total_time_ms(), Some(100));
    }

    #[test]
    fn test_retry_cycle_counts_attempts() {
        let mut job = Job::new_test("b");
        job.start(1).unwrap();
        job.schedule_retry("connection reset").unwrap();
        assert_eq!(job.state, JobState::Retrying);
        assert_eq!(job.last_error.as_deref(), Some("connection reset"));

        job.requeue().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert!(job.started_at.is_none());

        job.start(2).unwrap();
        assert_eq!(job.attempts, 2);
        job.complete(3, result()).unwrap();
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut job = Job::new_test("c");
        assert!(job.complete(1, result()).is_err());
        assert!(job.fail(1, "x").is_err());
        assert!(job.requeue().is_err());

        job.start(1).unwrap();
        assert!(job.start(2).is_err());
        job.fail(3, "boom").unwrap();

        // terminal states accept nothing
        assert!(job.schedule_retry("again").is_err());
        assert!(job.release_orphaned().is_err());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut job = Job::new_test("seed-x");
        job.start(job.enqueued_at).unwrap();
        job.complete(job.enqueued_at + 5, result()).unwrap();

        let value = serde_json::to_value(JobSnapshot::from(&job)).unwrap();
        assert_eq!(value["status"], "done");
        assert_eq!(value["seed"], "seed-x");
        assert_eq!(value["nonce"], 50_000);
        assert_eq!(value["queueTimeMs"], 0.0);
        assert_eq!(value["algorithm"], "sha256");
        assert!(value["callbackStatus"].is_null());
    }

    #[test]
    fn test_unknown_snapshot_is_neutral() {
        let snap = JobSnapshot::unknown("nope");
        assert_eq!(snap.status, JobState::Queued);
        assert_eq!(snap.attempts, 1);
        assert!(snap.hash.is_none());
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(1.23456), 1.23);
        assert_eq!(round_ms(2.499), 2.5);
    }
}
