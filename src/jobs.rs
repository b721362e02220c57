/// Background jobs
use crate::deletion::AccountDeletionManager;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Default sweep cadence for the expunge job
pub const DEFAULT_EXPUNGE_INTERVAL_SECS: u64 = 3600;

/// Periodic runner for the deletion expunge sweep
pub struct ExpungeScheduler {
    deletions: Arc<AccountDeletionManager>,
    period: Duration,
}

impl ExpungeScheduler {
    pub fn new(deletions: Arc<AccountDeletionManager>) -> Self {
        Self {
            deletions,
            period: Duration::from_secs(DEFAULT_EXPUNGE_INTERVAL_SECS),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Spawn the sweep loop onto the runtime
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        info!("Starting deletion expunge scheduler");
        tokio::spawn(Self::expunge_job(self))
    }

    async fn expunge_job(scheduler: Arc<Self>) {
        let mut interval = interval(scheduler.period);

        loop {
            interval.tick().await;

            match scheduler.deletions.expunge(None).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Expunge sweep processed {} deletion requests", count);
                    }
                }
                Err(e) => error!("Expunge sweep failed: {}", e),
            }
        }
    }
}
