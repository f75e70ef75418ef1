// SQLite SubscriptionRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::WebhookSubscription;
use hookline_core::error::{AppError, Result};
use hookline_core::port::SubscriptionRepository;
use sqlx::SqlitePool;

pub struct SqliteSubscriptionRepository {
    pool: SqlitePool,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscription CRUD lives upstream; this is for seeding and tests.
    pub async fn insert(&self, sub: &WebhookSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions (
                id, workspace_id, url, secret, enabled,
                success_count, failure_count, last_delivery_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sub.id)
        .bind(&sub.workspace_id)
        .bind(&sub.url)
        .bind(&sub.secret)
        .bind(if sub.enabled { 1 } else { 0 })
        .bind(sub.success_count)
        .bind(sub.failure_count)
        .bind(sub.last_delivery_at)
        .bind(sub.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Every write is scoped by workspace; a miss means the pair does not exist
    async fn execute_scoped(
        &self,
        sql: &str,
        workspace_id: &str,
        subscription_id: &str,
        value: Option<i64>,
    ) -> Result<()> {
        let mut query = sqlx::query(sql);
        if let Some(v) = value {
            query = query.bind(v);
        }
        let result = query
            .bind(workspace_id)
            .bind(subscription_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Subscription {} not found in workspace {}",
                subscription_id, workspace_id
            )));
        }
        Ok(())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    workspace_id: String,
    url: String,
    secret: String,
    enabled: i64, // SQLite boolean as integer
    success_count: i64,
    failure_count: i64,
    last_delivery_at: Option<i64>,
    created_at: i64,
}

impl SubscriptionRow {
    fn into_subscription(self) -> WebhookSubscription {
        WebhookSubscription {
            id: self.id,
            workspace_id: self.workspace_id,
            url: self.url,
            secret: self.secret,
            enabled: self.enabled != 0,
            success_count: self.success_count,
            failure_count: self.failure_count,
            last_delivery_at: self.last_delivery_at,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn find_by_id(
        &self,
        workspace_id: &str,
        subscription_id: &str,
    ) -> Result<Option<WebhookSubscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT * FROM webhook_subscriptions WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SubscriptionRow::into_subscription))
    }

    async fn increment_success(&self, workspace_id: &str, subscription_id: &str) -> Result<()> {
        self.execute_scoped(
            "UPDATE webhook_subscriptions SET success_count = success_count + 1 \
             WHERE workspace_id = ? AND id = ?",
            workspace_id,
            subscription_id,
            None,
        )
        .await
    }

    async fn increment_failure(&self, workspace_id: &str, subscription_id: &str) -> Result<()> {
        self.execute_scoped(
            "UPDATE webhook_subscriptions SET failure_count = failure_count + 1 \
             WHERE workspace_id = ? AND id = ?",
            workspace_id,
            subscription_id,
            None,
        )
        .await
    }

    async fn update_last_delivery_at(
        &self,
        workspace_id: &str,
        subscription_id: &str,
        delivered_at: i64,
    ) -> Result<()> {
        self.execute_scoped(
            "UPDATE webhook_subscriptions SET last_delivery_at = ? \
             WHERE workspace_id = ? AND id = ?",
            workspace_id,
            subscription_id,
            Some(delivered_at),
        )
        .await
    }
}
