//! PostgreSQL-backed `QueryHistoryRepository` implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;

use crate::domain::ports::{QueryHistoryRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, NewQueryHistoryEntry, QueryHistoryEntry, WpUserId};

use super::caller_scope::run_as;
use super::models::{NewQueryHistoryRow, QueryHistoryRow, convert_rows};
use super::pool::DbPool;
use super::schema::query_history;

/// Diesel-backed implementation of the [`QueryHistoryRepository`] port.
#[derive(Clone)]
pub struct DieselQueryHistoryRepository {
    pool: DbPool,
}

impl DieselQueryHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryHistoryRepository for DieselQueryHistoryRepository {
    async fn append(
        &self,
        caller: &CallerIdentity,
        entry: &NewQueryHistoryEntry,
    ) -> Result<QueryHistoryEntry, StorePersistenceError> {
        let row = NewQueryHistoryRow::from(entry);
        let stored: QueryHistoryRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(query_history::table)
                    .values(&row)
                    .returning(QueryHistoryRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        QueryHistoryEntry::try_from(stored)
    }

    async fn recent_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        limit: u32,
    ) -> Result<Vec<QueryHistoryEntry>, StorePersistenceError> {
        let key = wp_user_id.get();
        let limit = i64::from(limit);
        let rows: Vec<QueryHistoryRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                query_history::table
                    .filter(query_history::wp_user_id.eq(key))
                    .order((
                        query_history::created_at.desc().nulls_last(),
                        query_history::id.desc(),
                    ))
                    .limit(limit)
                    .select(QueryHistoryRow::as_select())
                    .load(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(convert_rows(rows))
    }

    async fn delete(
        &self,
        caller: &CallerIdentity,
        record_id: i32,
    ) -> Result<bool, StorePersistenceError> {
        let deleted = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(query_history::table.find(record_id))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(deleted > 0)
    }
}
