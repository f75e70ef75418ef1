// Test-Delivery Path ("send test webhook")
//
// Stateless: never reads or writes delivery records or counters.

use crate::application::transport::{truncate_utf8, DeliveryTransport};
use crate::application::worker::constants::MAX_TEST_BODY_BYTES;
use crate::domain::{WebhookEnvelope, WebhookSubscription};
use crate::error::{AppError, Result};
use crate::port::{TimeProvider, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Raw receiver response for a test webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestWebhookResult {
    pub status_code: u16,
    pub body: String,
}

pub struct TestWebhookService {
    transport: Arc<DeliveryTransport>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TestWebhookService {
    pub fn new(transport: Arc<DeliveryTransport>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            transport,
            time_provider,
        }
    }

    /// Send a signed test envelope to the subscription and return the
    /// receiver's status and (truncated) body.
    ///
    /// Any status code is passed through; only request construction and
    /// transport errors are returned as errors. Disabled subscriptions are
    /// still tested.
    ///
    /// # Errors
    /// - `AppError::RequestBuild` if the request cannot be constructed
    /// - `AppError::RequestFailed` if the request does not complete
    pub async fn send_test_webhook(
        &self,
        workspace_id: &str,
        subscription: &WebhookSubscription,
    ) -> Result<TestWebhookResult> {
        let envelope = WebhookEnvelope::test(workspace_id, self.time_provider.now_millis());
        let request = self
            .transport
            .build_request(&subscription.url, &subscription.secret, &envelope)
            .map_err(|e| AppError::RequestBuild(e.to_string()))?;

        let response = self.transport.http().post(request).await.map_err(|e| {
            warn!(
                workspace_id = %workspace_id,
                subscription_id = %subscription.id,
                error = %e,
                "Test webhook failed"
            );
            match e {
                TransportError::InvalidRequest(msg) => AppError::RequestBuild(msg),
                other => AppError::RequestFailed(other.to_string()),
            }
        })?;

        let body = response
            .body
            .map_err(|e| AppError::RequestFailed(e.to_string()))?;

        info!(
            workspace_id = %workspace_id,
            subscription_id = %subscription.id,
            status_code = response.status,
            "Test webhook sent"
        );

        Ok(TestWebhookResult {
            status_code: response.status,
            body: truncate_utf8(&body, MAX_TEST_BODY_BYTES),
        })
    }
}
