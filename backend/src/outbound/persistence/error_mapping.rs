//! Diesel and pool failures mapped onto [`StorePersistenceError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::StorePersistenceError;

use super::pool::PoolError;

/// Fragments PostgreSQL uses when grants or row-level security reject a
/// statement (SQLSTATE 42501).
const PERMISSION_MARKERS: &[&str] = &["permission denied", "row-level security"];

pub(crate) fn map_pool_error(error: PoolError) -> StorePersistenceError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            StorePersistenceError::connection(message)
        }
    }
}

fn is_permission_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    PERMISSION_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

pub(crate) fn map_diesel_error(error: DieselError) -> StorePersistenceError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StorePersistenceError::unique_violation(info.constraint_name().unwrap_or("unknown"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StorePersistenceError::foreign_key_violation(
                info.constraint_name().unwrap_or("unknown"),
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, info) => {
            StorePersistenceError::not_null_violation(info.column_name().unwrap_or("unknown"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            StorePersistenceError::connection("database connection closed")
        }
        DieselError::DatabaseError(_, info) if is_permission_message(info.message()) => {
            StorePersistenceError::permission_denied(info.message())
        }
        DieselError::DatabaseError(_, info) => StorePersistenceError::query(info.message()),
        DieselError::NotFound => StorePersistenceError::query("record not found"),
        DieselError::QueryBuilderError(_) => StorePersistenceError::query("database query error"),
        other => StorePersistenceError::query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("permission denied for table wp_users", true)]
    #[case("new row violates row-level security policy for table \"api_usage\"", true)]
    #[case("duplicate key value violates unique constraint", false)]
    fn permission_messages_are_recognised(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_permission_message(message), expected);
    }

    #[rstest]
    fn pool_failures_are_connection_errors() {
        assert_eq!(
            map_pool_error(PoolError::Checkout {
                message: "timed out".to_owned()
            }),
            StorePersistenceError::connection("timed out")
        );
    }

    #[rstest]
    fn missing_rows_are_query_errors() {
        assert_eq!(
            map_diesel_error(DieselError::NotFound),
            StorePersistenceError::query("record not found")
        );
    }
}
