//! Error taxonomy shared by every store repository.
//!
//! The variants mirror what the database engine reports: constraint
//! violations and permission denials surface as themselves so callers can
//! tell a duplicate sync from an outage.

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by store repository adapters.
    pub enum StorePersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "store connection failed: {message}",
        /// Query or mutation failed for a reason outside the taxonomy.
        Query { message: String } => "store query failed: {message}",
        /// A unique external identifier was inserted twice.
        UniqueViolation { constraint: String } =>
            "uniqueness violation on {constraint}",
        /// A row referenced a WordPress user that does not exist.
        ForeignKeyViolation { constraint: String } =>
            "referential integrity violation on {constraint}",
        /// A required column was left empty.
        NotNullViolation { column: String } => "required column {column} is null",
        /// Grants or row-level security rejected the statement.
        PermissionDenied { message: String } => "permission denied: {message}",
    }
}

impl StorePersistenceError {
    /// True for rejections raised by the access-control layer.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// True for the three write-time constraint violations.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation { .. }
                | Self::ForeignKeyViolation { .. }
                | Self::NotNullViolation { .. }
        )
    }
}
