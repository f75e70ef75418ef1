//! Shared wiring: in-memory SQLite + reqwest transport + fixed clock
#![allow(dead_code)]

use hookline_core::application::{DeliveryTransport, RetryPolicy, WebhookWorker, WorkerConfig};
use hookline_core::domain::{WebhookSubscription, Workspace};
use hookline_core::port::mocks::{FixedTimeProvider, SequentialIdProvider};
use hookline_infra_http::ReqwestTransport;
use hookline_infra_sqlite::{
    create_pool, run_migrations, SqliteDeliveryRepository, SqliteSubscriptionRepository,
    SqliteWorkspaceRepository,
};
use std::sync::Arc;
use std::time::Duration;

pub const NOW: i64 = 1_700_000_000_000;
pub const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

pub struct Harness {
    pub clock: Arc<FixedTimeProvider>,
    pub workspaces: Arc<SqliteWorkspaceRepository>,
    pub subscriptions: Arc<SqliteSubscriptionRepository>,
    pub deliveries: Arc<SqliteDeliveryRepository>,
    pub transport: Arc<DeliveryTransport>,
}

impl Harness {
    pub async fn new(http_timeout: Duration) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(FixedTimeProvider::new(NOW));
        let http = Arc::new(ReqwestTransport::new(http_timeout).unwrap());
        let transport = Arc::new(DeliveryTransport::new(
            http,
            clock.clone(),
            Arc::new(SequentialIdProvider::new("msg")),
        ));

        Self {
            workspaces: Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            subscriptions: Arc::new(SqliteSubscriptionRepository::new(pool.clone())),
            deliveries: Arc::new(SqliteDeliveryRepository::new(pool, clock.clone())),
            transport,
            clock,
        }
    }

    pub fn worker(&self) -> WebhookWorker {
        WebhookWorker::new(
            self.workspaces.clone(),
            self.deliveries.clone(),
            self.subscriptions.clone(),
            self.transport.clone(),
            Arc::new(RetryPolicy::new(self.clock.clone())),
            self.clock.clone(),
            WorkerConfig {
                poll_interval: Duration::from_millis(50),
                batch_size: 100,
            },
        )
    }

    pub async fn seed_workspace(&self, id: &str) {
        self.workspaces
            .insert(&Workspace::new(id, format!("{} Inc", id), NOW))
            .await
            .unwrap();
    }

    pub async fn seed_subscription(&self, sub: WebhookSubscription) {
        self.subscriptions.insert(&sub).await.unwrap();
    }
}
