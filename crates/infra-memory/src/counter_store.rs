// In-memory fixed-window counters

use async_trait::async_trait;
use powq_core::error::Result;
use powq_core::port::{CounterStore, TimeProvider, WindowCount};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Counter {
    count: u64,
    expires_at: i64,
}

pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryCounterStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            time_provider,
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let now = self.time_provider.now_millis();
        let window_ms = window.as_millis() as i64;

        let mut counters = self.counters.lock().await;
        // Expired windows are dropped lazily on the next hit
        counters.retain(|_, c| c.expires_at > now);

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + window_ms,
        });
        counter.count += 1;

        let remaining_ms = (counter.expires_at - now).max(0) as u64;
        Ok(WindowCount {
            count: counter.count,
            ttl_secs: remaining_ms.div_ceil(1000),
        })
    }
}
