//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Only PostgreSQL is reached from here. Adapters translate between domain
//! types and Diesel rows and contain no business logic.

pub mod persistence;
