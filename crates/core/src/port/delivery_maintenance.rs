// Delivery Maintenance port (stats + retention)
use crate::domain::DeliveryStatus;
use crate::error::Result;
use async_trait::async_trait;

/// Delivery bookkeeping outside the hot path
#[async_trait]
pub trait DeliveryMaintenance: Send + Sync {
    /// Count deliveries in a workspace by status
    async fn count_by_status(&self, workspace_id: &str, status: DeliveryStatus) -> Result<i64>;

    /// Delete terminal (delivered/failed) deliveries last touched before `cutoff_millis`.
    /// Pending deliveries are never purged.
    ///
    /// # Returns
    /// Number of deliveries deleted
    async fn purge_finished_before(&self, cutoff_millis: i64) -> Result<u64>;
}
