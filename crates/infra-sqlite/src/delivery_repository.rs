// SQLite DeliveryRepository + DeliveryMaintenance Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::{DeliveryStatus, WebhookDelivery};
use hookline_core::error::{AppError, Result};
use hookline_core::port::{
    DeliveryMaintenance, DeliveryRepository, FailureUpdate, RetryUpdate, TimeProvider,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SqliteDeliveryRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteDeliveryRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Deliveries are produced upstream; this is for seeding and tests.
    pub async fn insert(&self, delivery: &WebhookDelivery) -> Result<()> {
        delivery.validate()?;
        let now = self.time_provider.now_millis();

        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (
                id, workspace_id, subscription_id, event_type, payload,
                status, attempts, max_attempts, next_attempt_at,
                last_response_status, last_response_body, last_error,
                created_at, delivered_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&delivery.id)
        .bind(&delivery.workspace_id)
        .bind(&delivery.subscription_id)
        .bind(&delivery.event_type)
        .bind(serde_json::to_string(&delivery.payload)?)
        .bind(delivery.status.as_str())
        .bind(delivery.attempts)
        .bind(delivery.max_attempts)
        .bind(delivery.next_attempt_at)
        .bind(delivery.last_response_status.map(i64::from))
        .bind(&delivery.last_response_body)
        .bind(&delivery.last_error)
        .bind(delivery.created_at)
        .bind(delivery.delivered_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    pub async fn find_by_id(
        &self,
        workspace_id: &str,
        delivery_id: &str,
    ) -> Result<Option<WebhookDelivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            "SELECT * FROM webhook_deliveries WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(delivery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DeliveryRow::into_delivery).transpose()
    }

    fn not_pending(workspace_id: &str, delivery_id: &str) -> AppError {
        AppError::NotFound(format!(
            "Pending delivery {} not found in workspace {}",
            delivery_id, workspace_id
        ))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: String,
    workspace_id: String,
    subscription_id: String,
    event_type: String,
    payload: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    next_attempt_at: i64,
    last_response_status: Option<i64>,
    last_response_body: Option<String>,
    last_error: Option<String>,
    created_at: i64,
    delivered_at: Option<i64>,
}

impl DeliveryRow {
    fn into_delivery(self) -> Result<WebhookDelivery> {
        let status: DeliveryStatus = self.status.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(WebhookDelivery {
            id: self.id,
            workspace_id: self.workspace_id,
            subscription_id: self.subscription_id,
            event_type: self.event_type,
            payload,
            status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            next_attempt_at: self.next_attempt_at,
            last_response_status: self
                .last_response_status
                .and_then(|s| u16::try_from(s).ok()),
            last_response_body: self.last_response_body,
            last_error: self.last_error,
            created_at: self.created_at,
            delivered_at: self.delivered_at,
        })
    }
}

#[async_trait]
impl DeliveryRepository for SqliteDeliveryRepository {
    async fn fetch_pending(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>> {
        let now = self.time_provider.now_millis();

        // Oldest eligible first
        let rows: Vec<DeliveryRow> = sqlx::query_as(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE workspace_id = ? AND status = 'pending' AND next_attempt_at <= ?
            ORDER BY next_attempt_at ASC, created_at ASC
            LIMIT ?
            "#,
        )
        .bind(workspace_id)
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(workspace_id = %workspace_id, count = rows.len(), "Fetched pending deliveries");

        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }

    async fn mark_delivered(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        status_code: u16,
        body: &str,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'delivered', last_response_status = ?, last_response_body = ?,
                last_error = NULL, delivered_at = ?, updated_at = ?
            WHERE workspace_id = ? AND id = ? AND status = 'pending'
            "#,
        )
        .bind(i64::from(status_code))
        .bind(body)
        .bind(now)
        .bind(now)
        .bind(workspace_id)
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(Self::not_pending(workspace_id, delivery_id));
        }
        Ok(())
    }

    async fn schedule_retry(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &RetryUpdate,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();

        // Retry only while attempts stay below the ceiling
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET attempts = ?, next_attempt_at = ?, last_response_status = ?,
                last_response_body = ?, last_error = ?, updated_at = ?
            WHERE workspace_id = ? AND id = ? AND status = 'pending' AND ? < max_attempts
            "#,
        )
        .bind(update.attempts)
        .bind(update.next_attempt_at)
        .bind(update.status_code.map(i64::from))
        .bind(&update.body)
        .bind(&update.reason)
        .bind(now)
        .bind(workspace_id)
        .bind(delivery_id)
        .bind(update.attempts)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "Delivery {} cannot be rescheduled with {} attempts (not pending or attempts exhausted)",
                delivery_id, update.attempts
            )));
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &FailureUpdate,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'failed', attempts = ?, last_response_status = ?,
                last_response_body = ?, last_error = ?, updated_at = ?
            WHERE workspace_id = ? AND id = ? AND status = 'pending'
            "#,
        )
        .bind(update.attempts)
        .bind(update.status_code.map(i64::from))
        .bind(&update.body)
        .bind(&update.reason)
        .bind(now)
        .bind(workspace_id)
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(Self::not_pending(workspace_id, delivery_id));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryMaintenance for SqliteDeliveryRepository {
    async fn count_by_status(&self, workspace_id: &str, status: DeliveryStatus) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM webhook_deliveries WHERE workspace_id = ? AND status = ?",
        )
        .bind(workspace_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn purge_finished_before(&self, cutoff_millis: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_deliveries
            WHERE status IN ('delivered', 'failed')
              AND COALESCE(delivered_at, updated_at) < ?
            "#,
        )
        .bind(cutoff_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected();
        info!(deleted, cutoff_millis, "Purged finished deliveries");
        Ok(deleted)
    }
}
