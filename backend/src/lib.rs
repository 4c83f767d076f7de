//! Persisted state store for a WordPress/WooCommerce integration backend.
//!
//! The schema (six tables, row-level-security policies and grants) lives in
//! `backend/migrations`. This crate exposes typed records, repository ports
//! with Diesel adapters that execute under a caller's platform role, the
//! usage and account services built on them, and a schema contract audit.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod schema_snapshots;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{SettingsError, StoreSettings};
