// Webhook Subscription Domain Model

use super::WorkspaceId;
use serde::{Deserialize, Serialize};

/// Subscription ID (UUID v4)
pub type SubscriptionId = String;

/// Tenant-configured HTTP endpoint that receives signed event notifications.
///
/// Counters and `last_delivery_at` are only mutated by the delivery worker;
/// everything else belongs to administrative CRUD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: SubscriptionId,
    pub workspace_id: WorkspaceId,
    pub url: String,
    /// Shared signing key, never serialized back to API callers
    #[serde(skip_serializing)]
    pub secret: String,
    pub enabled: bool,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_delivery_at: Option<i64>, // epoch ms
    pub created_at: i64,               // epoch ms
}

impl WebhookSubscription {
    /// Create an enabled subscription with zeroed counters
    pub fn new(
        id: impl Into<String>,
        workspace_id: impl Into<String>,
        url: impl Into<String>,
        secret: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            url: url.into(),
            secret: secret.into(),
            enabled: true,
            success_count: 0,
            failure_count: 0,
            last_delivery_at: None,
            created_at,
        }
    }

    /// Builder-style toggle, mostly for tests and seeding
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
