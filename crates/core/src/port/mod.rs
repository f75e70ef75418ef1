// Port Layer - Interfaces for external dependencies

pub mod delivery_maintenance;
pub mod delivery_repository;
pub mod http_transport;
pub mod id_provider; // For deterministic testing
pub mod mocks;
pub mod rate_limiter;
pub mod subscription_repository;
pub mod time_provider;
pub mod workspace_repository;

// Re-exports
pub use delivery_maintenance::DeliveryMaintenance;
pub use delivery_repository::{DeliveryRepository, FailureUpdate, RetryUpdate};
pub use http_transport::{HttpResponse, HttpTransport, OutboundRequest, TransportError};
pub use id_provider::IdProvider;
pub use rate_limiter::RateLimiter;
pub use subscription_repository::SubscriptionRepository;
pub use time_provider::TimeProvider;
pub use workspace_repository::WorkspaceRepository;
