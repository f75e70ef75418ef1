// Worker - Webhook delivery polling loop

pub mod constants;
mod pipeline;
mod shutdown;

use constants::*;
pub use pipeline::WorkspaceReport;
pub use shutdown::{shutdown_channel, shutdown_with_grace, ShutdownSender, ShutdownToken};

use crate::application::retry::RetryPolicy;
use crate::application::transport::DeliveryTransport;
use crate::error::{AppError, Result};
use crate::port::{
    DeliveryRepository, RateLimiter, SubscriptionRepository, TimeProvider, WorkspaceRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Worker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(AppError::Config("poll interval must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config("batch size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Totals for one polling cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub workspaces: usize,
    pub failed_workspaces: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Cycle stopped early on shutdown
    pub cancelled: bool,
}

impl CycleReport {
    fn absorb(&mut self, ws: &WorkspaceReport) {
        self.delivered += ws.delivered;
        self.retried += ws.retried;
        self.failed += ws.failed;
        self.skipped += ws.skipped;
    }
}

/// Delivers pending webhooks for every workspace on a fixed interval.
///
/// Workspaces and deliveries are processed sequentially; one outbound
/// request is in flight at a time.
pub struct WebhookWorker {
    workspaces: Arc<dyn WorkspaceRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    transport: Arc<DeliveryTransport>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    config: WorkerConfig,
}

impl WebhookWorker {
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        deliveries: Arc<dyn DeliveryRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        transport: Arc<DeliveryTransport>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            workspaces,
            deliveries,
            subscriptions,
            transport,
            retry_policy,
            time_provider,
            rate_limiter: None,
            config,
        }
    }

    /// Throttle deliveries per subscription
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// The first cycle runs immediately, then once per poll interval.
    /// A shutdown lets the current cycle reach its next checkpoint, then exits.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Webhook worker started"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_cycle(&shutdown).await;
                }
                _ = shutdown.wait() => {
                    info!("Worker interrupted while idle");
                    break;
                }
            }
        }

        info!("Webhook worker stopped");
        Ok(())
    }

    /// One polling cycle over all workspaces
    ///
    /// Never fails: a listing error skips the cycle, a workspace error is
    /// logged and the next workspace still runs.
    pub async fn process_cycle(&self, shutdown: &ShutdownToken) -> CycleReport {
        let mut report = CycleReport::default();

        let workspaces = match self.workspaces.list_all().await {
            Ok(workspaces) => workspaces,
            Err(e) => {
                error!(error = %e, "Failed to list workspaces, skipping cycle");
                return report;
            }
        };
        report.workspaces = workspaces.len();

        for workspace in &workspaces {
            match self.process_workspace_deliveries(&workspace.id, shutdown).await {
                Ok(ws_report) => report.absorb(&ws_report),
                Err(AppError::Cancelled) => {
                    info!(workspace_id = %workspace.id, "Cycle cancelled by shutdown");
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    report.failed_workspaces += 1;
                    error!(
                        workspace_id = %workspace.id,
                        error = %e,
                        "Failed to process workspace deliveries"
                    );
                }
            }
        }

        if report.delivered + report.retried + report.failed > 0 || report.failed_workspaces > 0 {
            info!(
                workspaces = report.workspaces,
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed,
                skipped = report.skipped,
                failed_workspaces = report.failed_workspaces,
                "Delivery cycle finished"
            );
        } else if report.skipped > 0 {
            warn!(skipped = report.skipped, "Delivery cycle skipped deliveries");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeliveryStatus, WebhookDelivery, WebhookSubscription, Workspace};
    use crate::port::mocks::{
        FixedTimeProvider, InMemoryWebhookStore, MockHttpTransport, SequentialIdProvider,
    };
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    struct Harness {
        store: Arc<InMemoryWebhookStore>,
        http: Arc<MockHttpTransport>,
        worker: WebhookWorker,
    }

    fn harness(http: MockHttpTransport, config: WorkerConfig) -> Harness {
        let clock = Arc::new(FixedTimeProvider::new(NOW));
        let store = Arc::new(InMemoryWebhookStore::new(clock.clone()));
        let http = Arc::new(http);
        let transport = Arc::new(DeliveryTransport::new(
            http.clone(),
            clock.clone(),
            Arc::new(SequentialIdProvider::new("msg")),
        ));
        let worker = WebhookWorker::new(
            store.clone(),
            store.clone(),
            store.clone(),
            transport,
            Arc::new(RetryPolicy::new(clock.clone())),
            clock,
            config,
        );
        Harness {
            store,
            http,
            worker,
        }
    }

    fn seed_workspace(store: &InMemoryWebhookStore, ws: &str) {
        store.add_workspace(Workspace::new(ws, ws, 0));
        store.add_subscription(WebhookSubscription::new(
            format!("{}-sub", ws),
            ws,
            "https://example.com/hook",
            "secret",
            0,
        ));
        store.add_delivery(WebhookDelivery::new(
            format!("{}-d", ws),
            ws,
            format!("{}-sub", ws),
            "contact.created",
            json!({}),
            0,
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(WorkerConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(WorkerConfig {
            batch_size: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn test_listing_error_skips_cycle() {
        let h = harness(MockHttpTransport::new_status(200, "OK"), WorkerConfig::default());
        seed_workspace(&h.store, "ws-a");
        h.store.fail_list_workspaces();

        let (_tx, token) = shutdown_channel();
        let report = h.worker.process_cycle(&token).await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(h.http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_workspace_does_not_block_others() {
        let h = harness(MockHttpTransport::new_status(200, "OK"), WorkerConfig::default());
        seed_workspace(&h.store, "ws-a");
        seed_workspace(&h.store, "ws-b");
        h.store.fail_fetch_for("ws-a");

        let (_tx, token) = shutdown_channel();
        let report = h.worker.process_cycle(&token).await;

        assert_eq!(report.workspaces, 2);
        assert_eq!(report.failed_workspaces, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            h.store.delivery("ws-b-d").unwrap().status,
            DeliveryStatus::Delivered
        );
        assert_eq!(
            h.store.delivery("ws-a-d").unwrap().status,
            DeliveryStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_new_workspace_is_picked_up_next_cycle() {
        let h = harness(MockHttpTransport::new_status(200, "OK"), WorkerConfig::default());
        seed_workspace(&h.store, "ws-a");

        let (_tx, token) = shutdown_channel();
        assert_eq!(h.worker.process_cycle(&token).await.delivered, 1);

        seed_workspace(&h.store, "ws-b");
        let report = h.worker.process_cycle(&token).await;
        assert_eq!(report.workspaces, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            h.store.delivery("ws-b-d").unwrap().status,
            DeliveryStatus::Delivered
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_cycle_touches_nothing() {
        let h = harness(MockHttpTransport::new_status(200, "OK"), WorkerConfig::default());
        seed_workspace(&h.store, "ws-a");
        seed_workspace(&h.store, "ws-b");

        let (tx, token) = shutdown_channel();
        tx.shutdown();
        let report = h.worker.process_cycle(&token).await;

        assert!(report.cancelled);
        assert_eq!(h.http.call_count(), 0);
        assert!(h.store.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_processes_immediately_and_stops_within_grace() {
        let h = harness(
            MockHttpTransport::new_status(200, "OK"),
            WorkerConfig {
                poll_interval: Duration::from_secs(3600),
                batch_size: 10,
            },
        );
        seed_workspace(&h.store, "ws-a");
        let store = h.store.clone();
        let worker = Arc::new(h.worker);

        let (tx, token) = shutdown_channel();
        let runner = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(token).await })
        };

        for _ in 0..50 {
            if store.delivery("ws-a-d").unwrap().status == DeliveryStatus::Delivered {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            store.delivery("ws-a-d").unwrap().status,
            DeliveryStatus::Delivered
        );

        assert!(shutdown_with_grace(&tx, runner, SHUTDOWN_GRACE_PERIOD).await);
    }
}
