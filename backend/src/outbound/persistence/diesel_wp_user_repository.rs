//! PostgreSQL-backed `WpUserRepository` implementation using Diesel ORM.
//!
//! Every statement runs inside a caller-scoped transaction, so row-level
//! security decides which users are visible and whether a write is allowed.

use async_trait::async_trait;
use diesel::dsl::{exists, sql};
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;
use tracing::debug;

use crate::domain::ports::{StorePersistenceError, WpUserRepository};
use crate::domain::{
    CallerIdentity, EmailAddress, NewApiUsage, UpsertOutcome, WpUser, WpUserId, WpUserProfile,
    WpUserProfileUpdate,
};

use super::caller_scope::run_as;
use super::diesel_api_usage_repository::{lock_user_counters, oldest_or_insert};
use super::models::{NewApiUsageRow, NewWpUserRow, WpUserChangeset, WpUserRow, convert_rows};
use super::pool::DbPool;
use super::schema::wp_users;

/// Insert or overwrite one user.
///
/// `xmax` is zero only on a freshly inserted tuple, so the statement itself
/// reports which branch ran. Concurrent upserts of a new key therefore see
/// exactly one `Inserted`.
async fn upsert_row(
    conn: &mut AsyncPgConnection,
    row: &NewWpUserRow<'_>,
) -> QueryResult<UpsertOutcome> {
    let inserted: bool = diesel::insert_into(wp_users::table)
        .values(row)
        .on_conflict(wp_users::wp_user_id)
        .do_update()
        .set((
            wp_users::email.eq(excluded(wp_users::email)),
            wp_users::username.eq(excluded(wp_users::username)),
            wp_users::display_name.eq(excluded(wp_users::display_name)),
            wp_users::roles.eq(excluded(wp_users::roles)),
            wp_users::capabilities.eq(excluded(wp_users::capabilities)),
            wp_users::wp_token.eq(excluded(wp_users::wp_token)),
            wp_users::wp_token_expires.eq(excluded(wp_users::wp_token_expires)),
            wp_users::last_login.eq(excluded(wp_users::last_login)),
        ))
        .returning(sql::<Bool>("xmax = 0"))
        .get_result(conn)
        .await?;
    Ok(if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    })
}

/// Diesel-backed implementation of the [`WpUserRepository`] port.
#[derive(Clone)]
pub struct DieselWpUserRepository {
    pool: DbPool,
}

impl DieselWpUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WpUserRepository for DieselWpUserRepository {
    async fn upsert(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<UpsertOutcome, StorePersistenceError> {
        let row = NewWpUserRow::from(profile);
        let key = row.wp_user_id;
        let outcome = run_as(&self.pool, caller, move |conn| {
            async move { upsert_row(conn, &row).await }.scope_boxed()
        })
        .await?;

        debug!(wp_user_id = key, ?outcome, "upserted wp user");
        Ok(outcome)
    }

    async fn upsert_with_usage_counter(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<UpsertOutcome, StorePersistenceError> {
        let row = NewWpUserRow::from(profile);
        let key = row.wp_user_id;
        let usage = NewApiUsage::starting_at_zero(profile.wp_user_id, profile.email.clone());
        let counter = NewApiUsageRow::try_from(&usage)?;

        let (outcome, created_counter) = run_as(&self.pool, caller, move |conn| {
            async move {
                // Taken before the upsert so every counter writer locks in
                // the same order.
                lock_user_counters(conn, key).await?;
                let outcome = upsert_row(conn, &row).await?;
                let (_, created_counter) = oldest_or_insert(conn, key, &counter).await?;
                Ok((outcome, created_counter))
            }
            .scope_boxed()
        })
        .await?;

        debug!(wp_user_id = key, ?outcome, created_counter, "upserted wp user with counter");
        Ok(outcome)
    }

    async fn insert(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<WpUser, StorePersistenceError> {
        let row = NewWpUserRow::from(profile);
        let stored: WpUserRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(wp_users::table)
                    .values(&row)
                    .returning(WpUserRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        WpUser::try_from(stored)
    }

    async fn find_by_wp_user_id(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<WpUser>, StorePersistenceError> {
        let row: Option<WpUserRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                wp_users::table
                    .filter(wp_users::wp_user_id.eq(wp_user_id.get()))
                    .select(WpUserRow::as_select())
                    .first(conn)
                    .await
                    .optional()
            }
            .scope_boxed()
        })
        .await?;
        row.map(WpUser::try_from).transpose()
    }

    async fn find_by_email(
        &self,
        caller: &CallerIdentity,
        email: &EmailAddress,
    ) -> Result<Vec<WpUser>, StorePersistenceError> {
        let email = email.as_str();
        let rows: Vec<WpUserRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                wp_users::table
                    .filter(wp_users::email.eq(email))
                    .order(wp_users::wp_user_id.asc())
                    .select(WpUserRow::as_select())
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(convert_rows(rows))
    }

    async fn list(&self, caller: &CallerIdentity) -> Result<Vec<WpUser>, StorePersistenceError> {
        let rows: Vec<WpUserRow> = run_as(&self.pool, caller, |conn| {
            async move {
                wp_users::table
                    .order(wp_users::wp_user_id.asc())
                    .select(WpUserRow::as_select())
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(convert_rows(rows))
    }

    async fn update_profile(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        update: &WpUserProfileUpdate,
    ) -> Result<bool, StorePersistenceError> {
        let key = wp_user_id.get();

        // Diesel rejects an empty changeset; report whether the row is visible.
        if update.is_empty() {
            return run_as(&self.pool, caller, move |conn| {
                async move {
                    diesel::select(exists(
                        wp_users::table.filter(wp_users::wp_user_id.eq(key)),
                    ))
                    .get_result(conn)
                    .await
                }
                .scope_boxed()
            })
            .await;
        }

        let changeset = WpUserChangeset::from(update);
        let updated = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::update(wp_users::table.filter(wp_users::wp_user_id.eq(key)))
                    .set(&changeset)
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(updated > 0)
    }

    async fn delete(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<bool, StorePersistenceError> {
        let key = wp_user_id.get();
        let deleted = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(wp_users::table.filter(wp_users::wp_user_id.eq(key)))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(deleted > 0)
    }
}
