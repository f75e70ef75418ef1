// Webhook Delivery Domain Model

use super::{SubscriptionId, WorkspaceId};
use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Delivery ID (UUID v4)
pub type DeliveryId = String;

/// Default ceiling for delivery attempts
pub const DEFAULT_MAX_ATTEMPTS: i32 = 10;

/// Delivery lifecycle: `Pending` until it reaches a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// One queued event destined for one subscription, with its own retry state.
///
/// `subscription_id` is a weak reference: it is looked up (within the same
/// workspace), never owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    pub workspace_id: WorkspaceId,
    pub subscription_id: SubscriptionId,
    pub event_type: String,
    /// Forwarded verbatim inside the envelope
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,

    // Retry state
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: i64, // epoch ms

    // Last observed result
    pub last_response_status: Option<u16>,
    pub last_response_body: Option<String>,
    pub last_error: Option<String>,

    pub created_at: i64,
    pub delivered_at: Option<i64>,
}

impl WebhookDelivery {
    /// Create a pending delivery eligible immediately
    ///
    /// # Arguments
    ///
    /// * `id` - Unique delivery ID (injected, not generated)
    /// * `workspace_id` - Owning workspace
    /// * `subscription_id` - Target subscription in the same workspace
    /// * `event_type` - Event tag, e.g. `contact.created`
    /// * `payload` - Event data
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        workspace_id: impl Into<String>,
        subscription_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            subscription_id: subscription_id.into(),
            event_type: event_type.into(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            next_attempt_at: created_at,
            last_response_status: None,
            last_response_body: None,
            last_error: None,
            created_at,
            delivered_at: None,
        }
    }

    pub fn with_attempts(mut self, attempts: i32, max_attempts: i32) -> Self {
        self.attempts = attempts;
        self.max_attempts = max_attempts;
        self
    }

    /// Retry is only allowed while `attempts < max_attempts`
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check the retry-state invariant
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts <= 0 {
            return Err(DomainError::ValidationError(format!(
                "max_attempts must be positive, got {}",
                self.max_attempts
            )));
        }
        if self.attempts < 0 || self.attempts > self.max_attempts {
            return Err(DomainError::AttemptsExceeded {
                attempts: self.attempts,
                max_attempts: self.max_attempts,
            });
        }
        Ok(())
    }

    /// Transition to Delivered with explicit timestamp
    pub fn mark_delivered(&mut self, status_code: u16, body: String, now_millis: i64) -> Result<()> {
        self.ensure_pending(DeliveryStatus::Delivered)?;
        self.status = DeliveryStatus::Delivered;
        self.last_response_status = Some(status_code);
        self.last_response_body = Some(body);
        self.last_error = None;
        self.delivered_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Failed (terminal)
    pub fn mark_failed(
        &mut self,
        attempts: i32,
        reason: String,
        status_code: Option<u16>,
        body: Option<String>,
    ) -> Result<()> {
        self.ensure_pending(DeliveryStatus::Failed)?;
        self.status = DeliveryStatus::Failed;
        self.attempts = attempts;
        self.last_error = Some(reason);
        self.last_response_status = status_code;
        self.last_response_body = body;
        Ok(())
    }

    /// Stay Pending with a bumped attempt count and a future eligibility time
    pub fn reschedule(
        &mut self,
        attempts: i32,
        next_attempt_at: i64,
        reason: String,
        status_code: Option<u16>,
        body: Option<String>,
    ) -> Result<()> {
        self.ensure_pending(DeliveryStatus::Pending)?;
        if attempts >= self.max_attempts {
            return Err(DomainError::AttemptsExceeded {
                attempts,
                max_attempts: self.max_attempts,
            });
        }
        self.attempts = attempts;
        self.next_attempt_at = next_attempt_at;
        self.last_error = Some(reason);
        self.last_response_status = status_code;
        self.last_response_body = body;
        Ok(())
    }

    fn ensure_pending(&self, to: DeliveryStatus) -> Result<()> {
        if self.status != DeliveryStatus::Pending {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
