//! PostgreSQL-backed `SessionRepository` implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;

use crate::domain::ports::{SessionRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, NewUserSession, UserSession, WpUserId};

use super::caller_scope::run_as;
use super::models::{NewUserSessionRow, UserSessionRow, convert_rows};
use super::pool::DbPool;
use super::schema::user_sessions;

/// Diesel-backed implementation of the [`SessionRepository`] port.
#[derive(Clone)]
pub struct DieselSessionRepository {
    pool: DbPool,
}

impl DieselSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for DieselSessionRepository {
    async fn record(
        &self,
        caller: &CallerIdentity,
        session: &NewUserSession,
    ) -> Result<UserSession, StorePersistenceError> {
        let row = NewUserSessionRow::from(session);
        let stored: UserSessionRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(user_sessions::table)
                    .values(&row)
                    .returning(UserSessionRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        UserSession::try_from(stored)
    }

    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<UserSession>, StorePersistenceError> {
        let key = wp_user_id.get();
        let rows: Vec<UserSessionRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                user_sessions::table
                    .filter(user_sessions::wp_user_id.eq(key))
                    .order((
                        user_sessions::last_login.desc().nulls_last(),
                        user_sessions::id.desc(),
                    ))
                    .select(UserSessionRow::as_select())
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(convert_rows(rows))
    }

    async fn delete_last_login_before(
        &self,
        caller: &CallerIdentity,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorePersistenceError> {
        // `NULL < cutoff` is never true, so sessions without a login survive.
        run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(user_sessions::table.filter(user_sessions::last_login.lt(cutoff)))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await
    }
}
