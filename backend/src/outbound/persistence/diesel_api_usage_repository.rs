//! PostgreSQL-backed `ApiUsageRepository` implementation.
//!
//! `api_usage` has no dedup key, so a user may own several counter rows.
//! Reads take the oldest; increments touch every row in one statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Int4, Nullable, Timestamptz};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;
use tracing::{debug, warn};

use crate::domain::ports::{ApiUsageRepository, StorePersistenceError};
use crate::domain::{ApiUsage, CallerIdentity, NewApiUsage, WpUserId};

use super::caller_scope::run_as;
use super::models::{ApiUsageRow, NewApiUsageRow, convert_rows, query_count};
use super::pool::DbPool;
use super::schema::api_usage;

const INCREMENT_SQL: &str = r#"
UPDATE api_usage
SET queries = COALESCE(queries, 0) + 1,
    last_query = $2
WHERE wp_user_id = $1
RETURNING id, queries
"#;

// Transaction-scoped advisory lock keyed per user; `api_usage` has no
// unique key to arbitrate concurrent counter creation.
const COUNTER_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext('api_usage'), $1)";

/// Hold the user's counter lock until the surrounding transaction ends.
pub(super) async fn lock_user_counters(
    conn: &mut AsyncPgConnection,
    wp_user_id: i32,
) -> QueryResult<()> {
    sql_query(COUNTER_LOCK_SQL)
        .bind::<Int4, _>(wp_user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Oldest counter for the user, inserting `row` when there is none. The
/// flag is true when this call created it.
///
/// Callers hold [`lock_user_counters`] for the same user.
pub(super) async fn oldest_or_insert(
    conn: &mut AsyncPgConnection,
    wp_user_id: i32,
    row: &NewApiUsageRow<'_>,
) -> QueryResult<(ApiUsageRow, bool)> {
    let existing = api_usage::table
        .filter(api_usage::wp_user_id.eq(wp_user_id))
        .order(api_usage::id.asc())
        .select(ApiUsageRow::as_select())
        .first(conn)
        .await
        .optional()?;
    if let Some(counter) = existing {
        return Ok((counter, false));
    }
    let created = diesel::insert_into(api_usage::table)
        .values(row)
        .returning(ApiUsageRow::as_returning())
        .get_result(conn)
        .await?;
    Ok((created, true))
}

#[derive(Debug, QueryableByName)]
struct IncrementedCounter {
    #[diesel(sql_type = Int4)]
    id: i32,
    #[diesel(sql_type = Nullable<Int4>)]
    queries: Option<i32>,
}

/// Diesel-backed implementation of the [`ApiUsageRepository`] port.
#[derive(Clone)]
pub struct DieselApiUsageRepository {
    pool: DbPool,
}

impl DieselApiUsageRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiUsageRepository for DieselApiUsageRepository {
    async fn create(
        &self,
        caller: &CallerIdentity,
        usage: &NewApiUsage,
    ) -> Result<ApiUsage, StorePersistenceError> {
        let row = NewApiUsageRow::try_from(usage)?;
        let stored: ApiUsageRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(api_usage::table)
                    .values(&row)
                    .returning(ApiUsageRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        ApiUsage::try_from(stored)
    }

    async fn find_or_create(
        &self,
        caller: &CallerIdentity,
        usage: &NewApiUsage,
    ) -> Result<ApiUsage, StorePersistenceError> {
        let key = usage
            .wp_user_id
            .map(WpUserId::get)
            .ok_or_else(|| StorePersistenceError::query("usage counter needs a wp_user_id"))?;
        let row = NewApiUsageRow::try_from(usage)?;
        let (counter, created) = run_as(&self.pool, caller, move |conn| {
            async move {
                lock_user_counters(conn, key).await?;
                oldest_or_insert(conn, key, &row).await
            }
            .scope_boxed()
        })
        .await?;
        if created {
            debug!(wp_user_id = key, "created usage counter");
        }
        ApiUsage::try_from(counter)
    }

    async fn find_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<ApiUsage>, StorePersistenceError> {
        let key = wp_user_id.get();
        let row: Option<ApiUsageRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                api_usage::table
                    .filter(api_usage::wp_user_id.eq(key))
                    .order(api_usage::id.asc())
                    .select(ApiUsageRow::as_select())
                    .first(conn)
                    .await
                    .optional()
            }
            .scope_boxed()
        })
        .await?;
        row.map(ApiUsage::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<ApiUsage>, StorePersistenceError> {
        let key = wp_user_id.get();
        let rows: Vec<ApiUsageRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                api_usage::table
                    .filter(api_usage::wp_user_id.eq(key))
                    .order(api_usage::id.asc())
                    .select(ApiUsageRow::as_select())
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(convert_rows(rows))
    }

    async fn increment(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        at: DateTime<Utc>,
    ) -> Result<Option<u32>, StorePersistenceError> {
        let key = wp_user_id.get();
        let counters: Vec<IncrementedCounter> = run_as(&self.pool, caller, move |conn| {
            async move {
                sql_query(INCREMENT_SQL)
                    .bind::<Int4, _>(key)
                    .bind::<Timestamptz, _>(at)
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;

        if counters.len() > 1 {
            warn!(
                wp_user_id = key,
                rows = counters.len(),
                "user owns several usage counters"
            );
        }

        let count = counters
            .into_iter()
            .min_by_key(|counter| counter.id)
            .map(|counter| query_count(counter.id, counter.queries));
        debug!(wp_user_id = key, ?count, "incremented usage counter");
        Ok(count)
    }

    async fn delete_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<usize, StorePersistenceError> {
        let key = wp_user_id.get();
        run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(api_usage::table.filter(api_usage::wp_user_id.eq(key)))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await
    }
}
