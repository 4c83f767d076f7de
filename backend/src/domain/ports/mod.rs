//! Repository ports for the persisted store.
//!
//! Each collection has its own trait; all of them share
//! [`StorePersistenceError`] because the failure modes are the engine's, not
//! the collection's.

mod macros;
pub(crate) use macros::define_port_error;

mod api_usage_repository;
mod order_repository;
mod product_repository;
mod query_history_repository;
mod schema_snapshot_repository;
mod session_repository;
mod store_persistence_error;
mod wp_user_repository;

pub use api_usage_repository::ApiUsageRepository;
#[cfg(test)]
pub use api_usage_repository::MockApiUsageRepository;
#[cfg(test)]
pub use order_repository::MockOrderRepository;
pub use order_repository::OrderRepository;
#[cfg(test)]
pub use product_repository::MockProductRepository;
pub use product_repository::ProductRepository;
#[cfg(test)]
pub use query_history_repository::MockQueryHistoryRepository;
pub use query_history_repository::QueryHistoryRepository;
#[cfg(test)]
pub use schema_snapshot_repository::MockSchemaSnapshotRepository;
pub use schema_snapshot_repository::{
    FixtureSchemaSnapshotRepository, SchemaSnapshotRepository, SchemaSnapshotRepositoryError,
};
#[cfg(test)]
pub use session_repository::MockSessionRepository;
pub use session_repository::SessionRepository;
pub use store_persistence_error::StorePersistenceError;
#[cfg(test)]
pub use wp_user_repository::MockWpUserRepository;
pub use wp_user_repository::WpUserRepository;
