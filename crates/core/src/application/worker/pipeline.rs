// Per-workspace delivery pipeline and outcome bookkeeping

use super::{ShutdownToken, WebhookWorker};
use crate::application::retry::RetryDecision;
use crate::application::subscription_cache::SubscriptionCache;
use crate::domain::{DeliveryOutcome, WebhookDelivery};
use crate::error::{AppError, Result};
use crate::port::{FailureUpdate, RetryUpdate};
use tracing::{debug, error, info, warn};

/// Totals for one workspace batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkspaceReport {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum FailureHandling {
    Retried,
    Failed,
}

impl WebhookWorker {
    /// Deliver one batch of pending deliveries for a workspace.
    ///
    /// # Errors
    /// - Fetch errors are propagated unchanged
    /// - `AppError::Cancelled` when shutdown is observed between deliveries;
    ///   deliveries already handled stay handled, the rest are untouched
    pub async fn process_workspace_deliveries(
        &self,
        workspace_id: &str,
        shutdown: &ShutdownToken,
    ) -> Result<WorkspaceReport> {
        let mut report = WorkspaceReport::default();

        let pending = self
            .deliveries
            .fetch_pending(workspace_id, self.config.batch_size)
            .await?;
        if pending.is_empty() {
            return Ok(report);
        }

        debug!(
            workspace_id = %workspace_id,
            pending = pending.len(),
            "Processing pending deliveries"
        );

        let mut cache = SubscriptionCache::new(workspace_id, self.subscriptions.as_ref());

        for delivery in &pending {
            if shutdown.is_shutdown() {
                return Err(AppError::Cancelled);
            }

            let subscription = match cache.get(&delivery.subscription_id).await {
                Ok(Some(sub)) if sub.enabled => sub,
                Ok(Some(_)) => {
                    debug!(
                        delivery_id = %delivery.id,
                        subscription_id = %delivery.subscription_id,
                        "Subscription disabled, skipping delivery"
                    );
                    report.skipped += 1;
                    continue;
                }
                Ok(None) => {
                    warn!(
                        delivery_id = %delivery.id,
                        subscription_id = %delivery.subscription_id,
                        "Subscription not found, skipping delivery"
                    );
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        delivery_id = %delivery.id,
                        subscription_id = %delivery.subscription_id,
                        error = %e,
                        "Subscription lookup failed, skipping delivery"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            if let Some(limiter) = &self.rate_limiter {
                if !limiter.try_acquire(&subscription.id) {
                    debug!(
                        delivery_id = %delivery.id,
                        subscription_id = %subscription.id,
                        "Subscription throttled, deferring delivery"
                    );
                    report.skipped += 1;
                    continue;
                }
            }

            match self.transport.deliver(delivery, subscription, shutdown).await {
                DeliveryOutcome::Success { status_code, body } => {
                    self.handle_success(delivery, status_code, &body).await;
                    report.delivered += 1;
                }
                DeliveryOutcome::HttpFailure {
                    status_code,
                    body,
                    reason,
                } => match self
                    .handle_failure(delivery, Some(status_code), body, reason)
                    .await
                {
                    FailureHandling::Retried => report.retried += 1,
                    FailureHandling::Failed => report.failed += 1,
                },
                DeliveryOutcome::NetworkFailure { reason } => {
                    match self.handle_failure(delivery, None, None, reason).await {
                        FailureHandling::Retried => report.retried += 1,
                        FailureHandling::Failed => report.failed += 1,
                    }
                }
            }
        }

        Ok(report)
    }

    /// Status first, then counters; each write is independent
    async fn handle_success(&self, delivery: &WebhookDelivery, status_code: u16, body: &str) {
        let ws = delivery.workspace_id.as_str();
        let sub_id = delivery.subscription_id.as_str();

        if let Err(e) = self
            .deliveries
            .mark_delivered(ws, &delivery.id, status_code, body)
            .await
        {
            error!(
                delivery_id = %delivery.id,
                error = %e,
                "Failed to mark delivery as delivered"
            );
        }

        if let Err(e) = self.subscriptions.increment_success(ws, sub_id).await {
            warn!(subscription_id = %sub_id, error = %e, "Failed to increment success count");
        }

        let now = self.time_provider.now_millis();
        if let Err(e) = self
            .subscriptions
            .update_last_delivery_at(ws, sub_id, now)
            .await
        {
            warn!(subscription_id = %sub_id, error = %e, "Failed to update last delivery time");
        }

        info!(
            delivery_id = %delivery.id,
            subscription_id = %sub_id,
            status_code = status_code,
            "Webhook delivered"
        );
    }

    async fn handle_failure(
        &self,
        delivery: &WebhookDelivery,
        status_code: Option<u16>,
        body: Option<String>,
        reason: String,
    ) -> FailureHandling {
        let ws = delivery.workspace_id.as_str();
        let sub_id = delivery.subscription_id.as_str();

        match self.retry_policy.decide(delivery) {
            RetryDecision::Exhausted { attempts } => {
                let update = FailureUpdate {
                    attempts,
                    status_code,
                    body,
                    reason,
                };
                if let Err(e) = self.deliveries.mark_failed(ws, &delivery.id, &update).await {
                    error!(
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to mark delivery as failed"
                    );
                }
                if let Err(e) = self.subscriptions.increment_failure(ws, sub_id).await {
                    warn!(subscription_id = %sub_id, error = %e, "Failed to increment failure count");
                }
                warn!(
                    delivery_id = %delivery.id,
                    subscription_id = %sub_id,
                    attempts = attempts,
                    reason = %update.reason,
                    "Webhook delivery permanently failed"
                );
                FailureHandling::Failed
            }
            RetryDecision::Retry {
                attempts,
                next_attempt_at,
                ..
            } => {
                let update = RetryUpdate {
                    attempts,
                    next_attempt_at,
                    status_code,
                    body,
                    reason,
                };
                if let Err(e) = self
                    .deliveries
                    .schedule_retry(ws, &delivery.id, &update)
                    .await
                {
                    error!(
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to schedule delivery retry"
                    );
                }
                FailureHandling::Retried
            }
        }
    }
}
