//! Daemon configuration: flags with `POWQ_*` environment fallbacks

use clap::Parser;
use powq_core::application::{AdmissionConfig, AdmissionLimits};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "powq")]
#[command(about = "Proof-of-work job queue service", long_about = None)]
#[command(version)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "POWQ_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// Reported by GET /api/health
    #[arg(long, env = "POWQ_SERVICE_NAME", default_value = "powq")]
    pub service_name: String,

    /// Redis URL for the shared queue, store and counters; in-memory adapters when absent
    #[arg(long, env = "POWQ_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Key namespace in Redis
    #[arg(long, env = "POWQ_REDIS_PREFIX", default_value = "powq")]
    pub redis_prefix: String,

    /// Required `X-Admission-Secret` on submit routes
    #[arg(long, env = "POWQ_ADMISSION_SECRET", hide_env_values = true)]
    pub admission_secret: Option<String>,

    #[arg(long, env = "POWQ_WORKERS", default_value_t = 5)]
    pub workers: usize,

    /// Requests allowed per identity per window
    #[arg(long, env = "POWQ_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u64,

    #[arg(long, env = "POWQ_RATE_WINDOW_SECS", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Ready-queue depth at which async submissions get 503
    #[arg(long, env = "POWQ_BACKPRESSURE_THRESHOLD", default_value_t = 1000)]
    pub backpressure_threshold: usize,

    #[arg(long, env = "POWQ_OVERLOAD_RETRY_AFTER_SECS", default_value_t = 5)]
    pub overload_retry_after_secs: u64,

    #[arg(long, env = "POWQ_COMPUTE_MAX_RETRIES", default_value_t = 3)]
    pub compute_max_retries: u32,

    #[arg(long, env = "POWQ_COMPUTE_BACKOFF_BASE_MS", default_value_t = 1000)]
    pub compute_backoff_base_ms: u64,

    #[arg(long, env = "POWQ_COMPUTE_BACKOFF_MAX_MS", default_value_t = 60_000)]
    pub compute_backoff_max_ms: u64,

    /// Total POST attempts per callback
    #[arg(long, env = "POWQ_CALLBACK_MAX_ATTEMPTS", default_value_t = 5)]
    pub callback_max_attempts: u32,

    #[arg(long, env = "POWQ_CALLBACK_TIMEOUT_MS", default_value_t = 10_000)]
    pub callback_timeout_ms: u64,

    #[arg(long, env = "POWQ_CALLBACK_BACKOFF_BASE_MS", default_value_t = 1000)]
    pub callback_backoff_base_ms: u64,

    #[arg(long, env = "POWQ_CALLBACK_BACKOFF_MAX_MS", default_value_t = 600_000)]
    pub callback_backoff_max_ms: u64,

    /// How long shutdown waits for webhook deliveries before recording them as failed
    #[arg(long, env = "POWQ_CALLBACK_DRAIN_SECS", default_value_t = 30)]
    pub callback_drain_secs: u64,

    /// How long finished jobs stay queryable
    #[arg(long, env = "POWQ_RESULT_RETENTION_SECS", default_value_t = 3600)]
    pub result_retention_secs: u64,

    /// Reservations older than this are presumed orphaned
    #[arg(long, env = "POWQ_VISIBILITY_TIMEOUT_SECS", default_value_t = 300)]
    pub visibility_timeout_secs: u64,

    #[arg(long, env = "POWQ_MAINTENANCE_INTERVAL_SECS", default_value_t = 60)]
    pub maintenance_interval_secs: u64,

    /// Upper bound on each rate-limit / queue-depth call
    #[arg(long, env = "POWQ_STORE_TIMEOUT_MS", default_value_t = 250)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "POWQ_MAX_SEEDS", default_value_t = 100)]
    pub max_seeds: usize,

    #[arg(long, env = "POWQ_MAX_SEED_LEN", default_value_t = 1024)]
    pub max_seed_len: usize,

    #[arg(long, env = "POWQ_MAX_BODY_BYTES", default_value_t = 65_536)]
    pub max_body_bytes: usize,

    #[arg(long, env = "POWQ_MAX_DIFFICULTY", default_value_t = 100)]
    pub max_difficulty: u32,

    #[arg(long, env = "POWQ_MAX_STATUS_IDS", default_value_t = 500)]
    pub max_status_ids: usize,

    #[arg(long, env = "POWQ_MAX_CALLBACK_URL_LEN", default_value_t = 2048)]
    pub max_callback_url_len: usize,
}

impl Config {
    pub fn admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            limits: AdmissionLimits {
                max_seeds: self.max_seeds,
                max_seed_len: self.max_seed_len,
                max_body_bytes: self.max_body_bytes,
                max_difficulty: self.max_difficulty,
                max_status_ids: self.max_status_ids,
                max_callback_url_len: self.max_callback_url_len,
            },
            rate_limit: self.rate_limit,
            rate_window: Duration::from_secs(self.rate_window_secs.max(1)),
            backpressure_threshold: self.backpressure_threshold,
            overload_retry_after_secs: self.overload_retry_after_secs,
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub fn compute_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.compute_backoff_base_ms),
            Duration::from_millis(self.compute_backoff_max_ms),
        )
    }

    pub fn callback_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.callback_backoff_base_ms),
            Duration::from_millis(self.callback_backoff_max_ms),
        )
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    pub fn callback_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_drain_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}
