// Delivery Repository Port (Interface)

use crate::domain::WebhookDelivery;
use crate::error::Result;
use async_trait::async_trait;

/// Reschedule data for a retryable failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryUpdate {
    pub attempts: i32,
    pub next_attempt_at: i64, // epoch ms
    pub status_code: Option<u16>,
    pub body: Option<String>,
    pub reason: String,
}

/// Terminal failure data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureUpdate {
    pub attempts: i32,
    pub status_code: Option<u16>,
    pub body: Option<String>,
    pub reason: String,
}

/// Delivery persistence. Deliveries are created upstream; this port only
/// reads pending ones and records their outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    /// Fetch up to `limit` pending deliveries whose next attempt is due
    async fn fetch_pending(&self, workspace_id: &str, limit: usize)
        -> Result<Vec<WebhookDelivery>>;

    /// Terminal success
    async fn mark_delivered(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        status_code: u16,
        body: &str,
    ) -> Result<()>;

    /// Keep pending with a new attempt count and eligibility time
    async fn schedule_retry(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &RetryUpdate,
    ) -> Result<()>;

    /// Terminal failure after exhausting max attempts
    async fn mark_failed(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &FailureUpdate,
    ) -> Result<()>;
}
