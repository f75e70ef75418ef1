// ============================================================================
// Mock Implementations for Testing
// ============================================================================
//
// Public so adapter crates and integration tests can drive core services
// without a database or network.

use super::{
    DeliveryMaintenance, DeliveryRepository, FailureUpdate, HttpResponse, HttpTransport,
    IdProvider, OutboundRequest, RetryUpdate, SubscriptionRepository, TimeProvider,
    TransportError, WorkspaceRepository,
};
use crate::domain::{DeliveryStatus, WebhookDelivery, WebhookSubscription, Workspace};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Settable clock
pub struct FixedTimeProvider {
    now: AtomicI64,
}

impl FixedTimeProvider {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Deterministic IDs: `{prefix}-1`, `{prefix}-2`, ...
pub struct SequentialIdProvider {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }
}

impl IdProvider for SequentialIdProvider {
    fn generate_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Every store interaction, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListWorkspaces,
    FetchPending {
        workspace_id: String,
    },
    FindSubscription {
        workspace_id: String,
        subscription_id: String,
    },
    MarkDelivered {
        delivery_id: String,
        status_code: u16,
        body: String,
    },
    ScheduleRetry {
        delivery_id: String,
        update: RetryUpdate,
    },
    MarkFailed {
        delivery_id: String,
        update: FailureUpdate,
    },
    IncrementSuccess {
        subscription_id: String,
    },
    IncrementFailure {
        subscription_id: String,
    },
    UpdateLastDeliveryAt {
        subscription_id: String,
        delivered_at: i64,
    },
}

impl StoreCall {
    /// True for calls that change persisted state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            StoreCall::ListWorkspaces
                | StoreCall::FetchPending { .. }
                | StoreCall::FindSubscription { .. }
        )
    }
}

#[derive(Default)]
struct StoreState {
    workspaces: Vec<Workspace>,
    subscriptions: HashMap<(String, String), WebhookSubscription>,
    deliveries: Vec<WebhookDelivery>,
    calls: Vec<StoreCall>,
    fail_list_workspaces: bool,
    fail_fetch_for: HashSet<String>,
    fail_increment_success: bool,
    fail_mark_delivered: bool,
}

/// In-memory workspace/subscription/delivery store that records every call
pub struct InMemoryWebhookStore {
    state: Mutex<StoreState>,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryWebhookStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            time_provider,
        }
    }

    pub fn add_workspace(&self, workspace: Workspace) {
        self.state.lock().unwrap().workspaces.push(workspace);
    }

    pub fn add_subscription(&self, subscription: WebhookSubscription) {
        let key = (
            subscription.workspace_id.clone(),
            subscription.id.clone(),
        );
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .insert(key, subscription);
    }

    pub fn add_delivery(&self, delivery: WebhookDelivery) {
        self.state.lock().unwrap().deliveries.push(delivery);
    }

    pub fn delivery(&self, delivery_id: &str) -> Option<WebhookDelivery> {
        self.state
            .lock()
            .unwrap()
            .deliveries
            .iter()
            .find(|d| d.id == delivery_id)
            .cloned()
    }

    pub fn subscription(&self, workspace_id: &str, subscription_id: &str) -> Option<WebhookSubscription> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .get(&(workspace_id.to_string(), subscription_id.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    pub fn subscription_lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::FindSubscription { .. }))
            .count()
    }

    pub fn fail_list_workspaces(&self) {
        self.state.lock().unwrap().fail_list_workspaces = true;
    }

    pub fn fail_fetch_for(&self, workspace_id: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .fail_fetch_for
            .insert(workspace_id.into());
    }

    pub fn fail_increment_success(&self) {
        self.state.lock().unwrap().fail_increment_success = true;
    }

    pub fn fail_mark_delivered(&self) {
        self.state.lock().unwrap().fail_mark_delivered = true;
    }

    fn record(&self, call: StoreCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn with_delivery<F>(&self, workspace_id: &str, delivery_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut WebhookDelivery) -> crate::domain::error::Result<()>,
    {
        let mut state = self.state.lock().unwrap();
        let delivery = state
            .deliveries
            .iter_mut()
            .find(|d| d.workspace_id == workspace_id && d.id == delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("Delivery {} not found", delivery_id)))?;
        f(delivery)?;
        Ok(())
    }

    fn with_subscription<F>(&self, workspace_id: &str, subscription_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut WebhookSubscription),
    {
        let mut state = self.state.lock().unwrap();
        let sub = state
            .subscriptions
            .get_mut(&(workspace_id.to_string(), subscription_id.to_string()))
            .ok_or_else(|| {
                AppError::NotFound(format!("Subscription {} not found", subscription_id))
            })?;
        f(sub);
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryWebhookStore {
    async fn list_all(&self) -> Result<Vec<Workspace>> {
        self.record(StoreCall::ListWorkspaces);
        let state = self.state.lock().unwrap();
        if state.fail_list_workspaces {
            return Err(AppError::Database("workspace listing unavailable".to_string()));
        }
        Ok(state.workspaces.clone())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryWebhookStore {
    async fn find_by_id(
        &self,
        workspace_id: &str,
        subscription_id: &str,
    ) -> Result<Option<WebhookSubscription>> {
        self.record(StoreCall::FindSubscription {
            workspace_id: workspace_id.to_string(),
            subscription_id: subscription_id.to_string(),
        });
        Ok(self.subscription(workspace_id, subscription_id))
    }

    async fn increment_success(&self, workspace_id: &str, subscription_id: &str) -> Result<()> {
        self.record(StoreCall::IncrementSuccess {
            subscription_id: subscription_id.to_string(),
        });
        if self.state.lock().unwrap().fail_increment_success {
            return Err(AppError::Database("counter update failed".to_string()));
        }
        self.with_subscription(workspace_id, subscription_id, |s| s.success_count += 1)
    }

    async fn increment_failure(&self, workspace_id: &str, subscription_id: &str) -> Result<()> {
        self.record(StoreCall::IncrementFailure {
            subscription_id: subscription_id.to_string(),
        });
        self.with_subscription(workspace_id, subscription_id, |s| s.failure_count += 1)
    }

    async fn update_last_delivery_at(
        &self,
        workspace_id: &str,
        subscription_id: &str,
        delivered_at: i64,
    ) -> Result<()> {
        self.record(StoreCall::UpdateLastDeliveryAt {
            subscription_id: subscription_id.to_string(),
            delivered_at,
        });
        self.with_subscription(workspace_id, subscription_id, |s| {
            s.last_delivery_at = Some(delivered_at)
        })
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryWebhookStore {
    async fn fetch_pending(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>> {
        self.record(StoreCall::FetchPending {
            workspace_id: workspace_id.to_string(),
        });
        let now = self.time_provider.now_millis();
        let state = self.state.lock().unwrap();
        if state.fail_fetch_for.contains(workspace_id) {
            return Err(AppError::Database(format!(
                "pending fetch failed for workspace {}",
                workspace_id
            )));
        }
        Ok(state
            .deliveries
            .iter()
            .filter(|d| {
                d.workspace_id == workspace_id
                    && d.status == DeliveryStatus::Pending
                    && d.next_attempt_at <= now
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_delivered(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        status_code: u16,
        body: &str,
    ) -> Result<()> {
        self.record(StoreCall::MarkDelivered {
            delivery_id: delivery_id.to_string(),
            status_code,
            body: body.to_string(),
        });
        if self.state.lock().unwrap().fail_mark_delivered {
            return Err(AppError::Database("status update failed".to_string()));
        }
        let now = self.time_provider.now_millis();
        self.with_delivery(workspace_id, delivery_id, |d| {
            d.mark_delivered(status_code, body.to_string(), now)
        })
    }

    async fn schedule_retry(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &RetryUpdate,
    ) -> Result<()> {
        self.record(StoreCall::ScheduleRetry {
            delivery_id: delivery_id.to_string(),
            update: update.clone(),
        });
        self.with_delivery(workspace_id, delivery_id, |d| {
            d.reschedule(
                update.attempts,
                update.next_attempt_at,
                update.reason.clone(),
                update.status_code,
                update.body.clone(),
            )
        })
    }

    async fn mark_failed(
        &self,
        workspace_id: &str,
        delivery_id: &str,
        update: &FailureUpdate,
    ) -> Result<()> {
        self.record(StoreCall::MarkFailed {
            delivery_id: delivery_id.to_string(),
            update: update.clone(),
        });
        self.with_delivery(workspace_id, delivery_id, |d| {
            d.mark_failed(
                update.attempts,
                update.reason.clone(),
                update.status_code,
                update.body.clone(),
            )
        })
    }
}

#[async_trait]
impl DeliveryMaintenance for InMemoryWebhookStore {
    async fn count_by_status(&self, workspace_id: &str, status: DeliveryStatus) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deliveries
            .iter()
            .filter(|d| d.workspace_id == workspace_id && d.status == status)
            .count() as i64)
    }

    async fn purge_finished_before(&self, cutoff_millis: i64) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.deliveries.len();
        state.deliveries.retain(|d| {
            let finished_at = d.delivered_at.unwrap_or(d.next_attempt_at);
            !(d.status.is_terminal() && finished_at < cutoff_millis)
        });
        Ok((before - state.deliveries.len()) as u64)
    }
}

/// Mock transport behavior
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Respond with a status and body
    Respond(u16, String),
    /// Respond with a status whose body cannot be read
    UnreadableBody(u16, String),
    /// Fail at the transport level
    Fail(TransportError),
    /// Never complete (for cancellation tests)
    Hang,
}

/// Scripted HTTP transport. Queued behaviors are consumed first, then the
/// default behavior applies. Every request is captured.
pub struct MockHttpTransport {
    default: Mutex<MockBehavior>,
    queued: Mutex<VecDeque<MockBehavior>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockHttpTransport {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            default: Mutex::new(behavior),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn new_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(MockBehavior::Respond(status, body.into()))
    }

    pub fn new_fail(error: TransportError) -> Self {
        Self::new(MockBehavior::Fail(error))
    }

    pub fn push(&self, behavior: MockBehavior) {
        self.queued.lock().unwrap().push_back(behavior);
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post(&self, request: OutboundRequest) -> std::result::Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        let behavior = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().unwrap().clone());

        match behavior {
            MockBehavior::Respond(status, body) => Ok(HttpResponse::new(status, body)),
            MockBehavior::UnreadableBody(status, reason) => Ok(HttpResponse {
                status,
                body: Err(TransportError::Body(reason)),
            }),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(TransportError::Cancelled)
            }
        }
    }
}
