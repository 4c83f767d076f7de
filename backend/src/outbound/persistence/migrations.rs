//! Embedded schema migrations and platform role provisioning.
//!
//! Managed hosts pre-provision `authenticated` and `service_role`; a bare
//! PostgreSQL (local development, CI) needs them created before the
//! migration's grants and policies can reference them.

use diesel::pg::PgConnection;
use diesel::{Connection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::domain::DatabaseRole;

/// Migrations compiled from `backend/migrations`.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Failures while preparing the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// The database URL was rejected or the server could not be reached.
    #[error("failed to connect for migrations: {message}")]
    Connection { message: String },

    /// A pending migration failed; its transaction was rolled back.
    #[error("failed to apply migrations: {message}")]
    Apply { message: String },

    /// Creating `authenticated`/`service_role` or granting membership
    /// failed, usually for lack of `CREATEROLE`.
    #[error("failed to provision platform roles: {message}")]
    Provision { message: String },
}

fn connect(database_url: &str) -> Result<PgConnection, MigrationError> {
    PgConnection::establish(database_url).map_err(|error| MigrationError::Connection {
        message: error.to_string(),
    })
}

/// SQL creating each platform role when absent and granting membership to
/// the connecting login so it can `SET ROLE`.
pub(crate) fn provision_roles_sql() -> String {
    let mut body = String::from("DO $$\nBEGIN\n");
    for role in DatabaseRole::ALL {
        let name = role.as_str();
        body.push_str(&format!(
            "  IF NOT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = '{name}') THEN\n    CREATE ROLE {name} NOLOGIN;\n  END IF;\n"
        ));
        body.push_str(&format!(
            "  EXECUTE format('GRANT {name} TO %I', current_user);\n"
        ));
    }
    body.push_str("END\n$$;");
    body
}

/// Create the platform roles on a bare cluster. Safe to repeat.
///
/// # Errors
///
/// [`MigrationError::Provision`] when the login may not create roles.
pub fn provision_platform_roles(database_url: &str) -> Result<(), MigrationError> {
    let mut conn = connect(database_url)?;
    diesel::sql_query(provision_roles_sql())
        .execute(&mut conn)
        .map_err(|error| MigrationError::Provision {
            message: error.to_string(),
        })?;
    info!(roles = ?DatabaseRole::ALL, "platform roles provisioned");
    Ok(())
}

/// Apply every pending embedded migration; returns how many ran.
///
/// # Errors
///
/// [`MigrationError::Apply`] when a migration fails, typically because the
/// platform roles do not exist yet.
pub fn run_pending_migrations(database_url: &str) -> Result<usize, MigrationError> {
    let mut conn = connect(database_url)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|error| MigrationError::Apply {
            message: error.to_string(),
        })?;
    for version in &applied {
        info!(%version, "applied migration");
    }
    Ok(applied.len())
}
