// Fixed-size pool of workers sharing one queue

use super::{ShutdownToken, Worker, WorkerContext};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
}

impl WorkerPool {
    /// Create `size` workers (at least one)
    pub fn new(size: usize, ctx: WorkerContext) -> Self {
        let workers = (1..=size.max(1))
            .map(|id| Arc::new(Worker::new(id, ctx.clone())))
            .collect();
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Spawn every worker loop; each stops once `shutdown` fires
    pub fn spawn(&self, shutdown: ShutdownToken) -> WorkerPoolHandle {
        info!(workers = self.workers.len(), "Starting worker pool");
        let handles = self
            .workers
            .iter()
            .map(|worker| {
                let worker = Arc::clone(worker);
                let token = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = worker.run(token).await {
                        error!(worker_id = worker.id(), error = %e, "Worker exited with error");
                    }
                })
            })
            .collect();
        WorkerPoolHandle { handles }
    }
}

pub struct WorkerPoolHandle {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Wait for every worker to finish its current job and exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task failed");
            }
        }
        info!("Worker pool stopped");
    }
}
