// Redis late-ack queue
//
// Keys under `{prefix}:queue`:
//   :ready       list, LPUSH on enqueue, head is the right end
//   :processing  list of reserved ids awaiting ack
//   :leases      zset id -> reserved_at (ms)
//   :delayed     zset id -> ready_at (ms)
//
// Reserve, ack and stale requeue are Lua scripts so each moves an item
// between structures atomically.

use crate::connection::map_redis_error;
use async_trait::async_trait;
use powq_core::domain::JobId;
use powq_core::error::Result;
use powq_core::port::{JobQueue, Reservation, TimeProvider};
use redis::aio::ConnectionManager;
use redis::Script;
use std::sync::Arc;
use std::time::Duration;

const RESERVE_LUA: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, id in ipairs(due) do
    redis.call('ZREM', KEYS[3], id)
    redis.call('LPUSH', KEYS[1], id)
end
local id = redis.call('RPOPLPUSH', KEYS[1], KEYS[2])
if id then
    redis.call('ZADD', KEYS[4], ARGV[1], id)
end
return id
"#;

const ACK_LUA: &str = r#"
local score = redis.call('ZSCORE', KEYS[2], ARGV[1])
if score and tonumber(score) == tonumber(ARGV[2]) then
    redis.call('ZREM', KEYS[2], ARGV[1])
    redis.call('LREM', KEYS[1], -1, ARGV[1])
    return 1
end
return 0
"#;

const REQUEUE_STALE_LUA: &str = r#"
local stale = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for i = #stale, 1, -1 do
    local id = stale[i]
    redis.call('ZREM', KEYS[2], id)
    redis.call('LREM', KEYS[1], -1, id)
    redis.call('RPUSH', KEYS[3], id)
end
return stale
"#;

pub struct RedisJobQueue {
    redis: ConnectionManager,
    time_provider: Arc<dyn TimeProvider>,
    ready_key: String,
    processing_key: String,
    leases_key: String,
    delayed_key: String,
    reserve_script: Script,
    ack_script: Script,
    requeue_script: Script,
}

impl RedisJobQueue {
    pub fn new(redis: ConnectionManager, prefix: &str, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            redis,
            time_provider,
            ready_key: format!("{}:queue:ready", prefix),
            processing_key: format!("{}:queue:processing", prefix),
            leases_key: format!("{}:queue:leases", prefix),
            delayed_key: format!("{}:queue:delayed", prefix),
            reserve_script: Script::new(RESERVE_LUA),
            ack_script: Script::new(ACK_LUA),
            requeue_script: Script::new(REQUEUE_STALE_LUA),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job_id: &JobId) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("LPUSH")
            .arg(&self.ready_key)
            .arg(job_id)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn enqueue_delayed(&self, job_id: &JobId, ready_at: i64) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("ZADD")
            .arg(&self.delayed_key)
            .arg(ready_at)
            .arg(job_id)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn reserve(&self) -> Result<Option<Reservation>> {
        let now = self.time_provider.now_millis();
        let mut conn = self.redis.clone();

        let job_id: Option<String> = self
            .reserve_script
            .key(&self.ready_key)
            .key(&self.processing_key)
            .key(&self.delayed_key)
            .key(&self.leases_key)
            .arg(now)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(job_id.map(|job_id| Reservation {
            job_id,
            reserved_at: now,
        }))
    }

    async fn ack(&self, reservation: &Reservation) -> Result<()> {
        let mut conn = self.redis.clone();
        self.ack_script
            .key(&self.processing_key)
            .key(&self.leases_key)
            .arg(&reservation.job_id)
            .arg(reservation.reserved_at)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<Vec<JobId>> {
        let cutoff = self.time_provider.now_millis() - older_than.as_millis() as i64;
        let mut conn = self.redis.clone();

        self.requeue_script
            .key(&self.processing_key)
            .key(&self.leases_key)
            .key(&self.ready_key)
            .arg(cutoff)
            .invoke_async::<_, Vec<String>>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn depth(&self) -> Result<usize> {
        let mut conn = self.redis.clone();
        redis::cmd("LLEN")
            .arg(&self.ready_key)
            .query_async::<_, usize>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}
