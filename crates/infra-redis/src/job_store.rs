// Redis JobStore Implementation
//
// `{prefix}:job:{id}` holds the job as JSON; terminal jobs get a key expiry
// equal to the retention window. Webhook progress lives in a sibling
// `{prefix}:job:{id}:callback` key that inherits the job's remaining TTL.

use crate::connection::map_redis_error;
use async_trait::async_trait;
use powq_core::domain::{CallbackRecord, Job, JobId};
use powq_core::error::Result;
use powq_core::port::JobStore;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;

const RECORD_CALLBACK_LUA: &str = r#"
local ttl = redis.call('PTTL', KEYS[1])
if ttl == -2 then
    return 0
end
if ttl > 0 then
    redis.call('SET', KEYS[2], ARGV[1], 'PX', ttl)
else
    redis.call('SET', KEYS[2], ARGV[1])
end
return 1
"#;

pub struct RedisJobStore {
    redis: ConnectionManager,
    prefix: String,
    retention: Duration,
    record_callback_script: Script,
}

impl RedisJobStore {
    pub fn new(redis: ConnectionManager, prefix: &str, retention: Duration) -> Self {
        Self {
            redis,
            prefix: prefix.to_string(),
            retention,
            record_callback_script: Script::new(RECORD_CALLBACK_LUA),
        }
    }

    fn job_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn callback_key(&self, id: &str) -> String {
        format!("{}:job:{}:callback", self.prefix, id)
    }

    async fn write(&self, job: &Job) -> Result<()> {
        let data = serde_json::to_string(job)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.job_key(&job.id)).arg(data);
        if job.state.is_terminal() {
            cmd.arg("EX").arg(self.retention.as_secs().max(1));
        }

        let mut conn = self.redis.clone();
        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        self.write(job).await
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let mut conn = self.redis.clone();
        let (job, callback): (Option<String>, Option<String>) = redis::cmd("MGET")
            .arg(self.job_key(id))
            .arg(self.callback_key(id))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        let Some(data) = job else {
            return Ok(None);
        };
        let mut job: Job = serde_json::from_str(&data)?;
        if let Some(data) = callback {
            job.callback = Some(serde_json::from_str(&data)?);
        }
        Ok(Some(job))
    }

    async fn update(&self, job: &Job) -> Result<()> {
        self.write(job).await
    }

    async fn record_callback(&self, id: &JobId, record: &CallbackRecord) -> Result<()> {
        let data = serde_json::to_string(record)?;
        let mut conn = self.redis.clone();
        self.record_callback_script
            .key(self.job_key(id))
            .key(self.callback_key(id))
            .arg(data)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        // Key expiry does the purging
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;
    use powq_core::domain::{CallbackStatus, JobResult, JobState};

    async fn store(retention: Duration) -> Option<RedisJobStore> {
        let url = std::env::var("POWQ_TEST_REDIS_URL").ok()?;
        let prefix = format!("powq-test:{}", uuid::Uuid::new_v4());
        Some(RedisJobStore::new(connect(&url).await.unwrap(), &prefix, retention))
    }

    #[tokio::test]
    #[ignore = "requires POWQ_TEST_REDIS_URL"]
    async fn test_roundtrip_and_retention() {
        let Some(store) = store(Duration::from_secs(1)).await else { return };
        let mut job = Job::new_test("a");
        store.insert(&job).await.unwrap();
        assert_eq!(
            store.find_by_id(&job.id).await.unwrap().unwrap().state,
            JobState::Queued
        );

        job.start(1).unwrap();
        job.complete(
            2,
            JobResult {
                hash: "ff".repeat(32),
                nonce: 50_000,
                processing_time_ms: 1.0,
                wall_time_ms: 1.0,
            },
        )
        .unwrap();
        store.update(&job).await.unwrap();

        let mut record = CallbackRecord::pending();
        record.status = CallbackStatus::Delivered;
        store.record_callback(&job.id, &record).await.unwrap();

        let found = store.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.state, JobState::Done);
        assert_eq!(found.callback, Some(record));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(store.find_by_id(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires POWQ_TEST_REDIS_URL"]
    async fn test_callback_for_missing_job_is_dropped() {
        let Some(store) = store(Duration::from_secs(60)).await else { return };
        let id = "never-inserted".to_string();
        store
            .record_callback(&id, &CallbackRecord::pending())
            .await
            .unwrap();
        assert!(store.find_by_id(&id).await.unwrap().is_none());
    }
}
