// Webhook Envelope (JSON body sent to subscribers)

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Event type carried by the "send test webhook" envelope
pub const TEST_EVENT_TYPE: &str = "webhook.test";

/// Human-readable message carried by the test envelope
pub const TEST_WEBHOOK_MESSAGE: &str = "This is a test webhook from hookline";

/// Outbound JSON envelope
///
/// ```text
/// {"type": "contact.created", "timestamp": "2024-05-01T10:00:00Z", "data": {...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl WebhookEnvelope {
    /// Wrap an event payload, stamped with the send time
    pub fn new(event_type: impl Into<String>, data: serde_json::Value, now_millis: i64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: rfc3339(now_millis),
            data,
        }
    }

    /// Fixed test envelope: descriptive message plus the workspace identifier
    pub fn test(workspace_id: &str, now_millis: i64) -> Self {
        Self::new(
            TEST_EVENT_TYPE,
            serde_json::json!({
                "message": TEST_WEBHOOK_MESSAGE,
                "workspace_id": workspace_id,
            }),
            now_millis,
        )
    }

    /// Serialize to the raw request body (the exact bytes that get signed)
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn rfc3339(now_millis: i64) -> String {
    Utc.timestamp_millis_opt(now_millis)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
