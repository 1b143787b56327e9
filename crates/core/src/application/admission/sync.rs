// Inline (synchronous) execution of a batch

use super::validate::SubmitBatch;
use crate::domain::{round_ms, HashAlgorithm, JobState};
use crate::port::{Compute, TimeProvider};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

/// One inline result. `queue_time_ms` is always null: nothing was queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub cycle: usize,
    pub seed: String,
    pub status: JobState,
    pub algorithm: HashAlgorithm,
    pub difficulty: u32,
    pub latency_ms: f64,
    pub hash: Option<String>,
    pub nonce: Option<u64>,
    pub error: Option<String>,
    pub processing_time_ms: f64,
    pub wall_time_ms: f64,
    pub queue_time_ms: Option<f64>,
    pub total_time_ms: f64,
    pub enqueued_at_ms: i64,
    pub started_at_ms: i64,
    pub completed_at_ms: i64,
}

/// Run every seed of the batch in order, without retries.
/// A failed seed is reported in its own result and does not abort the batch.
pub async fn execute(
    compute: &dyn Compute,
    time_provider: &dyn TimeProvider,
    batch: &SubmitBatch,
) -> Vec<SyncResult> {
    let mut results = Vec::with_capacity(batch.seeds.len());

    for (index, seed) in batch.seeds.iter().enumerate() {
        let enqueued_at_ms = time_provider.now_millis();
        let started_at_ms = time_provider.now_millis();
        let wall_start = Instant::now();

        let outcome = compute
            .compute(seed, batch.difficulty, batch.algorithm)
            .await;

        let wall_ms = round_ms(wall_start.elapsed().as_secs_f64() * 1000.0);
        let completed_at_ms = time_provider.now_millis();

        let (status, latency_ms, hash, nonce, error) = match outcome {
            Ok(output) => (
                JobState::Done,
                round_ms(output.elapsed.as_secs_f64() * 1000.0),
                Some(output.hash),
                Some(output.nonce),
                None,
            ),
            Err(e) => {
                warn!(seed = %seed, error = %e, "Inline compute failed");
                (JobState::Failed, wall_ms, None, None, Some(e.to_string()))
            }
        };

        results.push(SyncResult {
            cycle: index + 1,
            seed: seed.clone(),
            status,
            algorithm: batch.algorithm,
            difficulty: batch.difficulty,
            latency_ms,
            hash,
            nonce,
            error,
            processing_time_ms: wall_ms,
            wall_time_ms: wall_ms,
            queue_time_ms: None,
            total_time_ms: wall_ms,
            enqueued_at_ms,
            started_at_ms,
            completed_at_ms,
        });
    }

    results
}
