// Repeated-hash compute routine
// reason: CPU-bound, so it runs on the blocking pool instead of a runtime worker
use async_trait::async_trait;
use blake2::Blake2b512;
use sha2::{Digest, Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};
use std::time::Instant;
use tracing::debug;

use powq_core::domain::{total_iterations, HashAlgorithm};
use powq_core::port::{Compute, ComputeError, ComputeOutput};

/// `data = H(data)`, `iterations` times, starting from `seed`; lowercase hex of the last digest
fn iterate<D: Digest>(seed: &[u8], iterations: u64) -> String {
    let mut data = D::digest(seed);
    for _ in 1..iterations {
        data = D::digest(data.as_slice());
    }
    hex::encode(data)
}

/// Run the hash chain synchronously
pub fn hash_seed(seed: &str, difficulty: u32, algorithm: HashAlgorithm) -> (String, u64) {
    let iterations = total_iterations(difficulty);
    let bytes = seed.as_bytes();
    let hash = match algorithm {
        HashAlgorithm::Sha256 => iterate::<Sha256>(bytes, iterations),
        HashAlgorithm::Sha512 => iterate::<Sha512>(bytes, iterations),
        HashAlgorithm::Sha3_256 => iterate::<Sha3_256>(bytes, iterations),
        HashAlgorithm::Sha3_512 => iterate::<Sha3_512>(bytes, iterations),
        HashAlgorithm::Blake2b => iterate::<Blake2b512>(bytes, iterations),
    };
    (hash, iterations)
}

/// Deterministic compute collaborator
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCompute;

impl HashCompute {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Compute for HashCompute {
    async fn compute(
        &self,
        seed: &str,
        difficulty: u32,
        algorithm: HashAlgorithm,
    ) -> Result<ComputeOutput, ComputeError> {
        if difficulty == 0 {
            return Err(ComputeError::permanent("difficulty must be at least 1"));
        }

        let seed = seed.to_string();
        let (hash, nonce, elapsed) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let (hash, nonce) = hash_seed(&seed, difficulty, algorithm);
            (hash, nonce, start.elapsed())
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                ComputeError::permanent("hash routine panicked")
            } else {
                ComputeError::permanent("hash routine cancelled")
            }
        })?;

        debug!(
            algorithm = %algorithm,
            difficulty,
            elapsed_ms = elapsed.as_millis() as u64,
            "Hash chain computed"
        );

        Ok(ComputeOutput {
            hash,
            nonce,
            elapsed,
        })
    }
}
