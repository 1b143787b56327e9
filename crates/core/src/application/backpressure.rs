// Admission circuit-breaker on queue depth

use crate::port::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Pure threshold comparison. Unknown depth never rejects.
pub fn should_reject(current_depth: Option<usize>, threshold: usize) -> bool {
    matches!(current_depth, Some(depth) if depth >= threshold)
}

/// Reads the live queue depth and applies [`should_reject`]
pub struct BackpressureGate {
    queue: Arc<dyn JobQueue>,
    threshold: usize,
    call_timeout: Duration,
}

impl BackpressureGate {
    pub fn new(queue: Arc<dyn JobQueue>, threshold: usize, call_timeout: Duration) -> Self {
        Self {
            queue,
            threshold,
            call_timeout,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Current depth, or `None` when the queue backend is unavailable or slow
    pub async fn current_depth(&self) -> Option<usize> {
        match tokio::time::timeout(self.call_timeout, self.queue.depth()).await {
            Ok(Ok(depth)) => Some(depth),
            Ok(Err(e)) => {
                warn!(error = %e, "Queue depth unavailable, admitting");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Queue depth check timed out, admitting"
                );
                None
            }
        }
    }

    pub async fn should_reject(&self) -> bool {
        should_reject(self.current_depth().await, self.threshold)
    }
}
