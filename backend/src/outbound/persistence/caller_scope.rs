//! Runs statements as a platform role with an asserted user identity.
//!
//! Each repository call opens a transaction, switches to the caller's role
//! with `SET LOCAL ROLE` and writes `app.current_user_id` with a
//! transaction-local `set_config`. Both revert on commit or rollback, so a
//! pooled connection returns to the pool unscoped.
//!
//! The connecting login must be a member of both platform roles (or a
//! superuser) for the role switch to succeed.

use diesel::sql_types::Text;
use diesel_async::scoped_futures::{ScopedBoxFuture, ScopedFutureExt};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::trace;

use crate::domain::ports::StorePersistenceError;
use crate::domain::{CURRENT_USER_SETTING, CallerIdentity, DatabaseRole};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::pool::DbPool;

/// Apply the caller's role and identity to the open transaction.
async fn apply_scope(
    conn: &mut AsyncPgConnection,
    role: DatabaseRole,
    asserted_user: &str,
) -> Result<(), diesel::result::Error> {
    // Role names come from a closed enum and cannot be bound as parameters.
    diesel::sql_query(format!("SET LOCAL ROLE {}", role.as_str()))
        .execute(conn)
        .await?;
    diesel::sql_query("SELECT set_config($1, $2, true)")
        .bind::<Text, _>(CURRENT_USER_SETTING)
        .bind::<Text, _>(asserted_user)
        .execute(conn)
        .await?;
    Ok(())
}

/// Run `operation` inside a transaction scoped to `caller`.
///
/// Any error rolls the transaction back and is mapped onto
/// [`StorePersistenceError`].
pub(crate) async fn run_as<'a, T, F>(
    pool: &DbPool,
    caller: &CallerIdentity,
    operation: F,
) -> Result<T, StorePersistenceError>
where
    F: for<'r> FnOnce(
            &'r mut AsyncPgConnection,
        ) -> ScopedBoxFuture<'a, 'r, Result<T, diesel::result::Error>>
        + Send
        + 'a,
    T: Send + 'a,
{
    let mut conn = pool.get().await.map_err(map_pool_error)?;
    let role = caller.role();
    let asserted_user = caller.asserted_user_setting();
    trace!(%caller, "opening caller-scoped transaction");

    conn.transaction(move |conn| {
        async move {
            apply_scope(conn, role, asserted_user.as_str()).await?;
            operation(conn).await
        }
        .scope_boxed()
    })
    .await
    .map_err(map_diesel_error)
}
