// Subscription Repository Port (Interface)

use crate::domain::WebhookSubscription;
use crate::error::Result;
use async_trait::async_trait;

/// Subscription persistence as seen by the delivery worker.
///
/// Every call is scoped by workspace; cross-workspace lookups are a bug.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find subscription by workspace + ID
    async fn find_by_id(
        &self,
        workspace_id: &str,
        subscription_id: &str,
    ) -> Result<Option<WebhookSubscription>>;

    /// Bump the cumulative success counter
    async fn increment_success(&self, workspace_id: &str, subscription_id: &str) -> Result<()>;

    /// Bump the cumulative failure counter
    async fn increment_failure(&self, workspace_id: &str, subscription_id: &str) -> Result<()>;

    /// Record the time of the latest successful delivery (epoch ms)
    async fn update_last_delivery_at(
        &self,
        workspace_id: &str,
        subscription_id: &str,
        delivered_at: i64,
    ) -> Result<()>;
}
