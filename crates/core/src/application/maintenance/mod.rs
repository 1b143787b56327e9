// Maintenance Service
// Periodic retention purge and orphan recovery

use crate::application::recovery::RecoveryService;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Default maintenance interval (60s)
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    pub purged_jobs: u64,
    pub recovered_jobs: usize,
}

/// Maintenance scheduler
///
/// Runs periodic maintenance in the background
pub struct MaintenanceScheduler {
    store: Arc<dyn JobStore>,
    recovery: Arc<RecoveryService>,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// Create a new maintenance scheduler
    ///
    /// # Arguments
    /// * `store` - Job store to purge
    /// * `recovery` - Orphan recovery, run on every tick
    /// * `interval` - How often to run maintenance
    pub fn new(store: Arc<dyn JobStore>, recovery: Arc<RecoveryService>, interval: Duration) -> Self {
        Self {
            store,
            recovery,
            interval,
        }
    }

    /// Run maintenance loop until shutdown
    ///
    /// The first tick fires immediately. Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            match self.run_now().await {
                Ok(stats) => debug!(
                    purged_jobs = stats.purged_jobs,
                    recovered_jobs = stats.recovered_jobs,
                    "Scheduled maintenance completed"
                ),
                Err(e) => error!(error = %e, "Scheduled maintenance failed"),
            }
        }
        info!("Maintenance scheduler stopped");
    }

    /// Run maintenance immediately
    pub async fn run_now(&self) -> Result<MaintenanceStats> {
        let purged_jobs = self.store.purge_expired().await?;
        let recovered_jobs = self.recovery.recover_orphaned_jobs().await?;

        if purged_jobs > 0 || recovered_jobs > 0 {
            info!(purged_jobs, recovered_jobs, "Maintenance pass");
        }
        Ok(MaintenanceStats {
            purged_jobs,
            recovered_jobs,
        })
    }
}
