// Redis fixed-window counters

use crate::connection::map_redis_error;
use async_trait::async_trait;
use powq_core::error::Result;
use powq_core::port::{CounterStore, WindowCount};
use redis::aio::ConnectionManager;
use std::time::Duration;

pub struct RedisCounterStore {
    redis: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    /// `SET NX EX` creates the key with its expiry only on the first hit of a
    /// window; `INCR` and `TTL` then run in the same MULTI block.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let window_secs = window.as_secs().max(1);
        let mut conn = self.redis.clone();

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(window_secs)
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(WindowCount {
            count,
            ttl_secs: if ttl > 0 { ttl as u64 } else { window_secs },
        })
    }
}
