// Domain Layer - Pure business logic and entities

pub mod delivery;
pub mod envelope;
pub mod error;
pub mod outcome;
pub mod subscription;
pub mod workspace;

// Re-exports
pub use delivery::{DeliveryId, DeliveryStatus, WebhookDelivery};
pub use envelope::{WebhookEnvelope, TEST_EVENT_TYPE, TEST_WEBHOOK_MESSAGE};
pub use error::DomainError;
pub use outcome::DeliveryOutcome;
pub use subscription::{SubscriptionId, WebhookSubscription};
pub use workspace::{Workspace, WorkspaceId};
