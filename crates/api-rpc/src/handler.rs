//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::types::{
    DeliveryStatsRequest, DeliveryStatsResponse, SubscriptionStatsRequest,
    SubscriptionStatsResponse, TestWebhookRequest, TestWebhookResponse,
};
use hookline_core::application::TestWebhookService;
use hookline_core::domain::{DeliveryStatus, WebhookSubscription};
use hookline_core::error::AppError;
use hookline_core::port::{DeliveryMaintenance, RateLimiter, SubscriptionRepository};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::debug;

pub const METHOD_TEST_WEBHOOK: &str = "webhooks.test.v1";
pub const METHOD_SUBSCRIPTION_STATS: &str = "webhooks.stats.v1";
pub const METHOD_DELIVERY_STATS: &str = "deliveries.stats.v1";

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    maintenance: Arc<dyn DeliveryMaintenance>,
    test_webhooks: Arc<TestWebhookService>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
}

impl RpcHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        maintenance: Arc<dyn DeliveryMaintenance>,
        test_webhooks: Arc<TestWebhookService>,
    ) -> Self {
        Self {
            subscriptions,
            maintenance,
            test_webhooks,
            rate_limiter: None,
        }
    }

    /// DoS protection, keyed by method name
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    fn check_rate(&self, method: &str) -> Result<(), ErrorObjectOwned> {
        match &self.rate_limiter {
            Some(limiter) if !limiter.try_acquire(method) => {
                debug!(method = %method, "RPC request throttled");
                Err(throttled())
            }
            _ => Ok(()),
        }
    }

    async fn load_subscription(
        &self,
        workspace_id: &str,
        subscription_id: &str,
    ) -> Result<WebhookSubscription, ErrorObjectOwned> {
        require("workspace_id", workspace_id)?;
        require("subscription_id", subscription_id)?;

        self.subscriptions
            .find_by_id(workspace_id, subscription_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(format!(
                    "Subscription {} not found",
                    subscription_id
                )))
            })
    }

    /// webhooks.test.v1
    pub async fn test_webhook(
        &self,
        params: TestWebhookRequest,
    ) -> Result<TestWebhookResponse, ErrorObjectOwned> {
        self.check_rate(METHOD_TEST_WEBHOOK)?;

        let subscription = self
            .load_subscription(&params.workspace_id, &params.subscription_id)
            .await?;

        let result = self
            .test_webhooks
            .send_test_webhook(&params.workspace_id, &subscription)
            .await
            .map_err(to_rpc_error)?;

        Ok(TestWebhookResponse {
            status_code: result.status_code,
            body: result.body,
        })
    }

    /// webhooks.stats.v1
    pub async fn subscription_stats(
        &self,
        params: SubscriptionStatsRequest,
    ) -> Result<SubscriptionStatsResponse, ErrorObjectOwned> {
        self.check_rate(METHOD_SUBSCRIPTION_STATS)?;

        let sub = self
            .load_subscription(&params.workspace_id, &params.subscription_id)
            .await?;

        Ok(SubscriptionStatsResponse {
            subscription_id: sub.id,
            url: sub.url,
            enabled: sub.enabled,
            success_count: sub.success_count,
            failure_count: sub.failure_count,
            last_delivery_at: sub.last_delivery_at,
        })
    }

    /// deliveries.stats.v1
    pub async fn delivery_stats(
        &self,
        params: DeliveryStatsRequest,
    ) -> Result<DeliveryStatsResponse, ErrorObjectOwned> {
        self.check_rate(METHOD_DELIVERY_STATS)?;
        require("workspace_id", &params.workspace_id)?;

        let ws = params.workspace_id.as_str();
        let pending = self
            .maintenance
            .count_by_status(ws, DeliveryStatus::Pending)
            .await
            .map_err(to_rpc_error)?;
        let delivered = self
            .maintenance
            .count_by_status(ws, DeliveryStatus::Delivered)
            .await
            .map_err(to_rpc_error)?;
        let failed = self
            .maintenance
            .count_by_status(ws, DeliveryStatus::Failed)
            .await
            .map_err(to_rpc_error)?;

        Ok(DeliveryStatsResponse {
            workspace_id: params.workspace_id,
            pending,
            delivered,
            failed,
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), ErrorObjectOwned> {
    if value.trim().is_empty() {
        return Err(to_rpc_error(AppError::Validation(format!(
            "{} must not be empty",
            field
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use hookline_core::application::{DeliveryTransport, KeyedRateLimiter};
    use hookline_core::domain::{WebhookDelivery, Workspace};
    use hookline_core::port::mocks::{
        FixedTimeProvider, InMemoryWebhookStore, MockHttpTransport, SequentialIdProvider,
    };
    use hookline_core::port::TransportError;
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryWebhookStore>,
        http: Arc<MockHttpTransport>,
        handler: RpcHandler,
    }

    fn fixture(http: MockHttpTransport) -> Fixture {
        let clock = Arc::new(FixedTimeProvider::new(1_700_000_000_000));
        let store = Arc::new(InMemoryWebhookStore::new(clock.clone()));
        store.add_workspace(Workspace::new("ws-1", "Acme", 0));
        store.add_subscription(WebhookSubscription::new(
            "sub-1",
            "ws-1",
            "https://example.com/hook",
            "secret",
            0,
        ));

        let http = Arc::new(http);
        let transport = Arc::new(DeliveryTransport::new(
            http.clone(),
            clock.clone(),
            Arc::new(SequentialIdProvider::new("msg")),
        ));
        let test_webhooks = Arc::new(TestWebhookService::new(transport, clock));
        let handler = RpcHandler::new(store.clone(), store.clone(), test_webhooks);
        Fixture {
            store,
            http,
            handler,
        }
    }

    fn test_request(sub: &str) -> TestWebhookRequest {
        TestWebhookRequest {
            workspace_id: "ws-1".to_string(),
            subscription_id: sub.to_string(),
        }
    }

    #[tokio::test]
    async fn test_webhook_returns_receiver_response_without_touching_store() {
        let f = fixture(MockHttpTransport::new_status(201, "created"));
        let response = f.handler.test_webhook(test_request("sub-1")).await.unwrap();

        assert_eq!(response.status_code, 201);
        assert_eq!(response.body, "created");
        assert_eq!(f.http.call_count(), 1);
        assert!(f.store.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_unknown_subscription_is_not_found() {
        let f = fixture(MockHttpTransport::new_status(200, "OK"));
        let err = f.handler.test_webhook(test_request("nope")).await.unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
        assert_eq!(f.http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_transport_failure_maps_to_transport_code() {
        let f = fixture(MockHttpTransport::new_fail(TransportError::Connect(
            "connection refused".to_string(),
        )));
        let err = f.handler.test_webhook(test_request("sub-1")).await.unwrap_err();
        assert_eq!(err.code(), code::TRANSPORT_ERROR);
        assert!(err.message().starts_with("request failed"));
    }

    #[tokio::test]
    async fn test_empty_ids_are_rejected() {
        let f = fixture(MockHttpTransport::new_status(200, "OK"));
        let err = f
            .handler
            .delivery_stats(DeliveryStatsRequest {
                workspace_id: " ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_stats() {
        let f = fixture(MockHttpTransport::new_status(200, "OK"));
        f.store.add_delivery(WebhookDelivery::new(
            "d-1", "ws-1", "sub-1", "contact.created", json!({}), 0,
        ));
        let mut done = WebhookDelivery::new("d-2", "ws-1", "sub-1", "contact.created", json!({}), 0);
        done.mark_delivered(200, "OK".into(), 5).unwrap();
        f.store.add_delivery(done);

        let stats = f
            .handler
            .delivery_stats(DeliveryStatsRequest {
                workspace_id: "ws-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!((stats.pending, stats.delivered, stats.failed), (1, 1, 0));

        let sub = f
            .handler
            .subscription_stats(SubscriptionStatsRequest {
                workspace_id: "ws-1".to_string(),
                subscription_id: "sub-1".to_string(),
            })
            .await
            .unwrap();
        assert!(sub.enabled);
        assert_eq!(sub.success_count, 0);
        assert_eq!(sub.url, "https://example.com/hook");
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_method() {
        let f = fixture(MockHttpTransport::new_status(200, "OK"));
        let limiter = Arc::new(KeyedRateLimiter::new(
            1,
            0.0,
            Arc::new(FixedTimeProvider::new(0)),
        ));
        let handler = f.handler.with_rate_limiter(limiter);

        handler.test_webhook(test_request("sub-1")).await.unwrap();
        let err = handler.test_webhook(test_request("sub-1")).await.unwrap_err();
        assert_eq!(err.code(), code::THROTTLED);

        // Other methods have their own bucket
        handler
            .delivery_stats(DeliveryStatsRequest {
                workspace_id: "ws-1".to_string(),
            })
            .await
            .unwrap();
    }
}
