//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};

/// webhooks.test.v1 - Send a test webhook to a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestWebhookRequest {
    pub workspace_id: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestWebhookResponse {
    pub status_code: u16,
    pub body: String,
}

/// webhooks.stats.v1 - Subscription delivery counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatsRequest {
    pub workspace_id: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatsResponse {
    pub subscription_id: String,
    pub url: String,
    pub enabled: bool,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_delivery_at: Option<i64>,
}

/// deliveries.stats.v1 - Delivery counts per status for a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatsRequest {
    pub workspace_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatsResponse {
    pub workspace_id: String,
    pub pending: i64,
    pub delivered: i64,
    pub failed: i64,
}
