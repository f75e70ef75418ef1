// Delivery Transport
//
// Builds the envelope, signs it, issues one POST and classifies the outcome.

use crate::application::signing;
use crate::application::worker::constants::MAX_STORED_BODY_BYTES;
use crate::application::worker::ShutdownToken;
use crate::domain::{DeliveryOutcome, WebhookDelivery, WebhookEnvelope, WebhookSubscription};
use crate::port::{HttpResponse, HttpTransport, IdProvider, OutboundRequest, TimeProvider, TransportError};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DeliveryTransport {
    http: Arc<dyn HttpTransport>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl DeliveryTransport {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            http,
            time_provider,
            id_provider,
        }
    }

    pub fn http(&self) -> &Arc<dyn HttpTransport> {
        &self.http
    }

    /// Serialize and sign an envelope for `url`.
    ///
    /// Each call draws a fresh `webhook-id`, so retries are distinct messages.
    pub fn build_request(
        &self,
        url: &str,
        secret: &str,
        envelope: &WebhookEnvelope,
    ) -> serde_json::Result<OutboundRequest> {
        let body = envelope.to_body()?;
        let msg_id = self.id_provider.generate_id();
        let timestamp = self.time_provider.now_millis() / 1000;

        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(signing::signed_headers(&msg_id, timestamp, &body, secret));

        Ok(OutboundRequest {
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Deliver one event to its subscription.
    ///
    /// A shutdown while the POST is in flight aborts the request and is
    /// reported as a network failure, so it goes through normal retry.
    pub async fn deliver(
        &self,
        delivery: &WebhookDelivery,
        subscription: &WebhookSubscription,
        shutdown: &ShutdownToken,
    ) -> DeliveryOutcome {
        let envelope = WebhookEnvelope::new(
            delivery.event_type.clone(),
            delivery.payload.clone(),
            self.time_provider.now_millis(),
        );
        let request = match self.build_request(&subscription.url, &subscription.secret, &envelope) {
            Ok(request) => request,
            Err(e) => {
                return DeliveryOutcome::NetworkFailure {
                    reason: format!("failed to encode payload: {}", e),
                }
            }
        };

        debug!(
            delivery_id = %delivery.id,
            subscription_id = %subscription.id,
            url = %subscription.url,
            "Posting webhook"
        );

        let result = tokio::select! {
            result = self.http.post(request) => result,
            _ = shutdown.cancelled() => Err(TransportError::Cancelled),
        };

        classify(&delivery.id, result)
    }
}

fn classify(delivery_id: &str, result: Result<HttpResponse, TransportError>) -> DeliveryOutcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return DeliveryOutcome::NetworkFailure {
                reason: e.to_string(),
            }
        }
    };

    let status_code = response.status;
    if response.is_success() {
        let body = match response.body {
            Ok(body) => truncate_utf8(&body, MAX_STORED_BODY_BYTES),
            Err(e) => {
                warn!(
                    delivery_id = %delivery_id,
                    status_code = status_code,
                    error = %e,
                    "Delivered but response body could not be read"
                );
                String::new()
            }
        };
        return DeliveryOutcome::Success { status_code, body };
    }

    match response.body {
        Ok(body) => DeliveryOutcome::HttpFailure {
            status_code,
            body: Some(truncate_utf8(&body, MAX_STORED_BODY_BYTES)),
            reason: format!("HTTP {}", status_code),
        },
        Err(e) => DeliveryOutcome::HttpFailure {
            status_code,
            body: None,
            reason: e.to_string(),
        },
    }
}

/// Cut `s` to at most `max` bytes without splitting a character
pub fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signing::{
        verify, HEADER_WEBHOOK_ID, HEADER_WEBHOOK_SIGNATURE, HEADER_WEBHOOK_TIMESTAMP,
    };
    use crate::application::worker::shutdown_channel;
    use crate::port::mocks::{
        FixedTimeProvider, MockBehavior, MockHttpTransport, SequentialIdProvider,
    };
    use serde_json::json;
    use std::time::Duration;

    const NOW: i64 = 1_714_557_600_000;

    fn transport(http: Arc<MockHttpTransport>) -> DeliveryTransport {
        DeliveryTransport::new(
            http,
            Arc::new(FixedTimeProvider::new(NOW)),
            Arc::new(SequentialIdProvider::new("msg")),
        )
    }

    fn fixtures() -> (WebhookDelivery, WebhookSubscription) {
        (
            WebhookDelivery::new("d-1", "ws-1", "sub-1", "contact.created", json!({"id": 7}), 0),
            WebhookSubscription::new("sub-1", "ws-1", "https://example.com/hook", "s3cret", 0),
        )
    }

    #[tokio::test]
    async fn test_request_is_signed_and_verifiable() {
        let http = Arc::new(MockHttpTransport::new_status(200, "OK"));
        let (delivery, sub) = fixtures();
        let (_tx, token) = shutdown_channel();

        transport(http.clone()).deliver(&delivery, &sub, &token).await;

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.url, "https://example.com/hook");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header(HEADER_WEBHOOK_ID), Some("msg-1"));
        assert_eq!(req.header(HEADER_WEBHOOK_TIMESTAMP), Some("1714557600"));

        let signature = req.header(HEADER_WEBHOOK_SIGNATURE).unwrap();
        assert!(signature.starts_with("v1,"));
        assert!(verify("msg-1", NOW / 1000, &req.body, "s3cret", signature));

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["type"], "contact.created");
        assert_eq!(body["data"]["id"], 7);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_a_fresh_message_id() {
        let http = Arc::new(MockHttpTransport::new_status(500, "nope"));
        let (delivery, sub) = fixtures();
        let (_tx, token) = shutdown_channel();
        let transport = transport(http.clone());

        transport.deliver(&delivery, &sub, &token).await;
        transport.deliver(&delivery, &sub, &token).await;

        let ids: Vec<_> = http
            .requests()
            .iter()
            .map(|r| r.header(HEADER_WEBHOOK_ID).unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["msg-1", "msg-2"]);
    }

    #[tokio::test]
    async fn test_classification() {
        let (delivery, sub) = fixtures();
        let (_tx, token) = shutdown_channel();

        let outcome = transport(Arc::new(MockHttpTransport::new_status(204, "")))
            .deliver(&delivery, &sub, &token)
            .await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Success {
                status_code: 204,
                body: String::new()
            }
        );

        let outcome = transport(Arc::new(MockHttpTransport::new_status(503, "busy")))
            .deliver(&delivery, &sub, &token)
            .await;
        assert_eq!(
            outcome,
            DeliveryOutcome::HttpFailure {
                status_code: 503,
                body: Some("busy".to_string()),
                reason: "HTTP 503".to_string(),
            }
        );

        let outcome = transport(Arc::new(MockHttpTransport::new_fail(TransportError::Connect(
            "dns error: no such host".to_string(),
        ))))
        .deliver(&delivery, &sub, &token)
        .await;
        assert_eq!(outcome.status_code(), None);
        assert!(matches!(
            outcome,
            DeliveryOutcome::NetworkFailure { ref reason } if reason.contains("no such host")
        ));
    }

    #[tokio::test]
    async fn test_unreadable_body() {
        let (delivery, sub) = fixtures();
        let (_tx, token) = shutdown_channel();

        let failing = Arc::new(MockHttpTransport::new(MockBehavior::UnreadableBody(
            500,
            "connection reset".to_string(),
        )));
        let outcome = transport(failing).deliver(&delivery, &sub, &token).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::HttpFailure {
                status_code: 500,
                body: None,
                reason: "failed to read response body: connection reset".to_string(),
            }
        );

        let ok = Arc::new(MockHttpTransport::new(MockBehavior::UnreadableBody(
            200,
            "connection reset".to_string(),
        )));
        let outcome = transport(ok).deliver(&delivery, &sub, &token).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_stored_body_is_capped() {
        let (delivery, sub) = fixtures();
        let (_tx, token) = shutdown_channel();
        let http = Arc::new(MockHttpTransport::new_status(200, "x".repeat(10_000)));

        match transport(http).deliver(&delivery, &sub, &token).await {
            DeliveryOutcome::Success { body, .. } => assert_eq!(body.len(), MAX_STORED_BODY_BYTES),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_request_is_network_failure() {
        let (delivery, sub) = fixtures();
        let (tx, token) = shutdown_channel();
        let http = Arc::new(MockHttpTransport::new(MockBehavior::Hang));
        let transport = transport(http);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.shutdown();
        });
        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            transport.deliver(&delivery, &sub, &token),
        )
        .await
        .expect("in-flight request should be aborted");
        stopper.await.unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::NetworkFailure {
                reason: "request cancelled".to_string()
            }
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // "é" is two bytes; cutting at 2 would split it
        assert_eq!(truncate_utf8("aéb", 2), "a");
        assert_eq!(truncate_utf8("", 0), "");
    }
}
