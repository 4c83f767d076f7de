//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain repository ports, backed by
//! PostgreSQL via `diesel-async` with `bb8` pooling.
//!
//! - Diesel row structs (`models.rs`) and table definitions (`schema.rs`)
//!   stay private to this module.
//! - Every adapter call runs in a transaction scoped to the caller's
//!   platform role and asserted identity, so the database's row-level
//!   security is the only access check.
//! - Database errors are mapped onto
//!   [`StorePersistenceError`](crate::domain::ports::StorePersistenceError).
//!
//! # Example
//!
//! ```ignore
//! use woo_sync_store::domain::CallerIdentity;
//! use woo_sync_store::outbound::persistence::{DbPool, DieselWpUserRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/woo")).await?;
//! let users = DieselWpUserRepository::new(pool);
//! let visible = users.list(&CallerIdentity::service()).await?;
//! ```

mod caller_scope;
mod diesel_api_usage_repository;
mod diesel_order_repository;
mod diesel_product_repository;
mod diesel_query_history_repository;
mod diesel_session_repository;
mod diesel_wp_user_repository;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod postgres_schema_snapshot_repository;
mod schema;

pub use diesel_api_usage_repository::DieselApiUsageRepository;
pub use diesel_order_repository::DieselOrderRepository;
pub use diesel_product_repository::DieselProductRepository;
pub use diesel_query_history_repository::DieselQueryHistoryRepository;
pub use diesel_session_repository::DieselSessionRepository;
pub use diesel_wp_user_repository::DieselWpUserRepository;
pub use migrations::{
    MIGRATIONS, MigrationError, provision_platform_roles, run_pending_migrations,
};
pub use pool::{DbPool, PoolConfig, PoolError};
pub use postgres_schema_snapshot_repository::PostgresSchemaSnapshotRepository;
