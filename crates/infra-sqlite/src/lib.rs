// Hookline Infrastructure - SQLite Adapter
// Implements: WorkspaceRepository, SubscriptionRepository, DeliveryRepository, DeliveryMaintenance

mod connection;
mod delivery_repository;
mod error;
mod migration;
mod subscription_repository;
mod workspace_repository;

pub use connection::create_pool;
pub use delivery_repository::SqliteDeliveryRepository;
pub use migration::run_migrations;
pub use subscription_repository::SqliteSubscriptionRepository;
pub use workspace_repository::SqliteWorkspaceRepository;

// Note: sqlx::Error conversion is handled by map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
