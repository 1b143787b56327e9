//! Shared wiring for the integration tests: in-memory adapters on a manual clock

#![allow(dead_code)]

use powq_core::application::{
    AdmissionConfig, AdmissionService, CallbackDelivery, Jitter, RetryPolicy, Worker,
    WorkerContext,
};
use powq_core::domain::{CallbackRecord, CallbackStatus, Job};
use powq_core::port::callback_sender::mocks::FlakyEndpoint;
use powq_core::port::id_provider::mocks::SequentialIdProvider;
use powq_core::port::time_provider::mocks::ManualClock;
use powq_core::port::{Compute, ComputeError, CounterStore, JobStore, TimeProvider};
use powq_infra_memory::{InMemoryCounterStore, InMemoryJobQueue, InMemoryJobStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const START_MILLIS: i64 = 1_700_000_000_000;
pub const RETENTION: Duration = Duration::from_secs(3600);

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub queue: Arc<InMemoryJobQueue>,
    pub store: Arc<InMemoryJobStore>,
    pub counters: Arc<InMemoryCounterStore>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let time: Arc<dyn TimeProvider> = clock.clone();
        Self {
            queue: Arc::new(InMemoryJobQueue::new(time.clone())),
            store: Arc::new(InMemoryJobStore::new(RETENTION, time.clone())),
            counters: Arc::new(InMemoryCounterStore::new(time)),
            clock,
        }
    }

    pub fn time(&self) -> Arc<dyn TimeProvider> {
        self.clock.clone()
    }

    pub fn admission(&self, compute: Arc<dyn Compute>, config: AdmissionConfig) -> AdmissionService {
        self.admission_with_counters(self.counters.clone(), compute, config)
    }

    pub fn admission_with_counters(
        &self,
        counters: Arc<dyn CounterStore>,
        compute: Arc<dyn Compute>,
        config: AdmissionConfig,
    ) -> AdmissionService {
        AdmissionService::new(
            counters,
            self.queue.clone(),
            self.store.clone(),
            compute,
            Arc::new(SequentialIdProvider::new("job")),
            self.time(),
            config,
        )
    }

    /// Worker with zero backoff so retried jobs are immediately ready again
    pub fn worker(
        &self,
        compute: Arc<dyn Compute>,
        max_retries: u32,
        callbacks: Option<Arc<CallbackDelivery>>,
    ) -> Worker {
        Worker::new(1, self.context(compute, max_retries, callbacks))
    }

    pub fn context(
        &self,
        compute: Arc<dyn Compute>,
        max_retries: u32,
        callbacks: Option<Arc<CallbackDelivery>>,
    ) -> WorkerContext {
        self.context_with_policy(
            compute,
            RetryPolicy::for_compute(max_retries, Duration::ZERO, Duration::ZERO),
            callbacks,
        )
    }

    pub fn context_with_policy(
        &self,
        compute: Arc<dyn Compute>,
        retry_policy: RetryPolicy<ComputeError>,
        callbacks: Option<Arc<CallbackDelivery>>,
    ) -> WorkerContext {
        WorkerContext {
            queue: self.queue.clone(),
            store: self.store.clone(),
            compute,
            retry_policy: Arc::new(retry_policy),
            callbacks,
            time_provider: self.time(),
        }
    }

    pub fn callbacks(&self, endpoint: Arc<FlakyEndpoint>, max_attempts: u32) -> Arc<CallbackDelivery> {
        self.callbacks_with_backoff(endpoint, max_attempts, Duration::ZERO)
    }

    /// Real-time backoff between POSTs (the delivery loop sleeps on the tokio clock)
    pub fn callbacks_with_backoff(
        &self,
        endpoint: Arc<FlakyEndpoint>,
        max_attempts: u32,
        base: Duration,
    ) -> Arc<CallbackDelivery> {
        Arc::new(CallbackDelivery::new(
            endpoint,
            self.store.clone(),
            self.time(),
            RetryPolicy::for_callbacks(max_attempts, base, base * 10).with_jitter(Jitter::None),
            Duration::from_secs(1),
        ))
    }

    pub async fn job(&self, id: &str) -> Job {
        self.store
            .find_by_id(&id.to_string())
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("job {} should exist", id))
    }

    /// Poll until the webhook outcome is final
    pub async fn settled_callback(&self, id: &str) -> CallbackRecord {
        for _ in 0..500 {
            if let Some(record) = self.job(id).await.callback {
                if record.status != CallbackStatus::Pending {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("callback for {} never settled", id);
    }
}

pub fn seeds(seeds: &[&str]) -> Value {
    json!({ "seeds": seeds, "difficulty": 1, "algorithm": "sha256" })
}

pub fn seeds_with_callback(seeds: &[&str], url: &str) -> Value {
    json!({ "seeds": seeds, "difficulty": 1, "algorithm": "sha256", "callbackUrl": url })
}
