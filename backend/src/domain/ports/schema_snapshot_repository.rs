//! Port abstraction for reading catalogue metadata.

use crate::domain::SchemaSnapshot;

use super::define_port_error;

define_port_error! {
    /// Errors raised while introspecting the live schema.
    pub enum SchemaSnapshotRepositoryError {
        /// Connection to the backing datastore failed.
        Connection { message: String } =>
            "schema snapshot connection failed: {message}",
        /// A catalogue query failed.
        Query { message: String } =>
            "schema snapshot query failed: {message}",
    }
}

/// Port for reading tables, keys, policies and grants from the active
/// persistence backend.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaSnapshotRepository: Send + Sync {
    /// Load a snapshot of the `public` schema.
    fn load_schema_snapshot(&self) -> Result<SchemaSnapshot, SchemaSnapshotRepositoryError>;
}

/// Fixture implementation returning an empty schema.
#[derive(Debug, Clone, Default)]
pub struct FixtureSchemaSnapshotRepository;

impl SchemaSnapshotRepository for FixtureSchemaSnapshotRepository {
    fn load_schema_snapshot(&self) -> Result<SchemaSnapshot, SchemaSnapshotRepositoryError> {
        Ok(SchemaSnapshot::default())
    }
}
