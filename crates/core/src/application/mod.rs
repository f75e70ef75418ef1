// Application Layer - Use Cases and Business Logic

pub mod rate_limit;
pub mod retention;
pub mod retry;
pub mod signing;
pub mod subscription_cache;
pub mod test_delivery;
pub mod transport;
pub mod worker;

// Re-exports
pub use rate_limit::KeyedRateLimiter;
pub use retention::RetentionScheduler;
pub use retry::{RetryDecision, RetryPolicy};
pub use subscription_cache::SubscriptionCache;
pub use test_delivery::{TestWebhookResult, TestWebhookService};
pub use transport::DeliveryTransport;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, WebhookWorker, WorkerConfig};
