// Retention Scheduler
// Periodically purges finished deliveries older than the retention window

use crate::application::worker::ShutdownToken;
use crate::error::{AppError, Result};
use crate::port::{DeliveryMaintenance, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Retention scheduler
///
/// Runs the purge in the background; pending deliveries are never touched.
pub struct RetentionScheduler {
    maintenance: Arc<dyn DeliveryMaintenance>,
    time_provider: Arc<dyn TimeProvider>,
    retention_days: u32,
    interval: Duration,
}

impl RetentionScheduler {
    /// Create a new retention scheduler
    ///
    /// # Arguments
    /// * `maintenance` - Delivery maintenance implementation
    /// * `time_provider` - Clock for computing the cutoff
    /// * `retention_days` - Keep finished deliveries this long
    /// * `interval` - How often to purge
    pub fn new(
        maintenance: Arc<dyn DeliveryMaintenance>,
        time_provider: Arc<dyn TimeProvider>,
        retention_days: u32,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(AppError::Config(
                "retention interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            maintenance,
            time_provider,
            retention_days,
            interval,
        })
    }

    /// Epoch ms before which finished deliveries are purged
    pub fn cutoff_millis(&self) -> i64 {
        self.time_provider.now_millis() - i64::from(self.retention_days) * MILLIS_PER_DAY
    }

    /// Run retention loop until shutdown (spawn with tokio::spawn)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention_days,
            "Retention scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.run_now().await {
                        error!(error = %e, "Scheduled retention purge failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Retention scheduler stopped");
    }

    /// Purge immediately (manual trigger)
    ///
    /// # Returns
    /// Number of deliveries deleted
    pub async fn run_now(&self) -> Result<u64> {
        let cutoff = self.cutoff_millis();
        let purged = self.maintenance.purge_finished_before(cutoff).await?;
        info!(
            purged = purged,
            cutoff_ms = cutoff,
            "Retention purge completed"
        );
        Ok(purged)
    }
}
