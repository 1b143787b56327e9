// Async Enqueue Use Case

use super::validate::SubmitBatch;
use crate::domain::{round_ms, Job, JobId, JobRequest};
use crate::error::Result;
use crate::port::{IdProvider, JobQueue, JobStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Per-seed acknowledgement returned to async clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// 1-based position of the seed in the batch
    pub cycle: usize,
    pub seed: String,
    pub request_id: JobId,
    pub ack_time_ms: f64,
}

/// Execute enqueue use case
///
/// Each seed becomes one job. The record is written to the store before the
/// id is pushed to the queue, so a worker never reserves an id it cannot load.
///
/// # Arguments
///
/// * `store` - Job store
/// * `queue` - Work queue
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `batch` - Validated submission
pub async fn execute(
    store: &dyn JobStore,
    queue: &dyn JobQueue,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    batch: SubmitBatch,
) -> Result<Vec<Ack>> {
    let mut acks = Vec::with_capacity(batch.seeds.len());

    for (index, seed) in batch.seeds.into_iter().enumerate() {
        let ack_start = Instant::now();
        let job = Job::new(
            id_provider.generate_id(),
            time_provider.now_millis(),
            JobRequest {
                seed: seed.clone(),
                difficulty: batch.difficulty,
                algorithm: batch.algorithm,
                callback_url: batch.callback_url.clone(),
            },
        );

        store.insert(&job).await?;
        queue.enqueue(&job.id).await?;

        acks.push(Ack {
            cycle: index + 1,
            seed,
            request_id: job.id,
            ack_time_ms: round_ms(ack_start.elapsed().as_secs_f64() * 1000.0),
        });
    }

    info!(
        count = acks.len(),
        difficulty = batch.difficulty,
        algorithm = %batch.algorithm,
        callback = batch.callback_url.is_some(),
        "Async batch enqueued"
    );

    Ok(acks)
}
