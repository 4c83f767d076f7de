//! PostgreSQL-backed `OrderRepository` implementation.
//!
//! Snapshot upserts are last-write-wins on `wc_order_id` and always refresh
//! `synced_at`. Large batches go out as several statements inside one
//! transaction, each below PostgreSQL's bind-parameter limit.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;
use tracing::debug;

use crate::domain::ports::{OrderRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, WcOrder, WcOrderId, WcOrderSnapshot, WpUserId};

use super::caller_scope::run_as;
use super::models::{NewWcOrderRow, WcOrderRow, convert_rows};
use super::pool::DbPool;
use super::schema::wc_orders;

/// PostgreSQL's ceiling on bind parameters in one statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Bound columns per `wc_orders` snapshot row, `synced_at` included.
const ORDER_COLUMNS: usize = 17;

/// How many rows of `columns` bind parameters fit in one statement.
pub(crate) const fn rows_per_statement(columns: usize) -> usize {
    MAX_BIND_PARAMS / columns
}

/// Keep the last snapshot for each key, preserving first-seen order.
///
/// PostgreSQL refuses to update the same row twice in one `ON CONFLICT`
/// statement, so duplicates inside a batch are collapsed first.
pub(crate) fn last_per_key<T, K, F>(items: &[T], key: F) -> Vec<&T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut kept: Vec<&T> = Vec::with_capacity(items.len());
    for item in items {
        match positions.get(&key(item)).and_then(|&index| kept.get_mut(index)) {
            Some(slot) => *slot = item,
            None => {
                positions.insert(key(item), kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

async fn upsert_chunk(
    conn: &mut AsyncPgConnection,
    chunk: &[NewWcOrderRow<'_>],
) -> QueryResult<usize> {
    diesel::insert_into(wc_orders::table)
        .values(chunk)
        .on_conflict(wc_orders::wc_order_id)
        .do_update()
        .set((
            wc_orders::wp_user_id.eq(excluded(wc_orders::wp_user_id)),
            wc_orders::wc_customer_id.eq(excluded(wc_orders::wc_customer_id)),
            wc_orders::status.eq(excluded(wc_orders::status)),
            wc_orders::total.eq(excluded(wc_orders::total)),
            wc_orders::subtotal.eq(excluded(wc_orders::subtotal)),
            wc_orders::tax_total.eq(excluded(wc_orders::tax_total)),
            wc_orders::currency.eq(excluded(wc_orders::currency)),
            wc_orders::date_created.eq(excluded(wc_orders::date_created)),
            wc_orders::date_completed.eq(excluded(wc_orders::date_completed)),
            wc_orders::product_count.eq(excluded(wc_orders::product_count)),
            wc_orders::product_names.eq(excluded(wc_orders::product_names)),
            wc_orders::billing_email.eq(excluded(wc_orders::billing_email)),
            wc_orders::billing_phone.eq(excluded(wc_orders::billing_phone)),
            wc_orders::shipping_method.eq(excluded(wc_orders::shipping_method)),
            wc_orders::payment_method.eq(excluded(wc_orders::payment_method)),
            wc_orders::synced_at.eq(excluded(wc_orders::synced_at)),
        ))
        .execute(conn)
        .await
}

/// Diesel-backed implementation of the [`OrderRepository`] port.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn upsert_snapshots(
        &self,
        caller: &CallerIdentity,
        snapshots: &[WcOrderSnapshot],
    ) -> Result<usize, StorePersistenceError> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let synced_at = Utc::now();
        let rows: Vec<NewWcOrderRow<'_>> = last_per_key(snapshots, |s| s.wc_order_id)
            .into_iter()
            .map(|snapshot| NewWcOrderRow::from_snapshot(snapshot, synced_at))
            .collect();

        let written = run_as(&self.pool, caller, move |conn| {
            async move {
                let mut written = 0;
                for chunk in rows.chunks(rows_per_statement(ORDER_COLUMNS)) {
                    written += upsert_chunk(conn, chunk).await?;
                }
                Ok(written)
            }
            .scope_boxed()
        })
        .await?;

        debug!(received = snapshots.len(), written, "upserted order snapshots");
        Ok(written)
    }

    async fn insert(
        &self,
        caller: &CallerIdentity,
        snapshot: &WcOrderSnapshot,
    ) -> Result<WcOrder, StorePersistenceError> {
        let row = NewWcOrderRow::from_snapshot(snapshot, Utc::now());
        let stored: WcOrderRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(wc_orders::table)
                    .values(&row)
                    .returning(WcOrderRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        WcOrder::try_from(stored)
    }

    async fn find_by_wc_order_id(
        &self,
        caller: &CallerIdentity,
        wc_order_id: WcOrderId,
    ) -> Result<Option<WcOrder>, StorePersistenceError> {
        let key = wc_order_id.get();
        let row: Option<WcOrderRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                wc_orders::table
                    .filter(wc_orders::wc_order_id.eq(key))
                    .select(WcOrderRow::as_select())
                    .first(conn)
                    .await
                    .optional()
            }
            .scope_boxed()
        })
        .await?;
        row.map(WcOrder::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<WcOrder>, StorePersistenceError> {
        let key = wp_user_id.get();
        let rows: Vec<WcOrderRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                wc_orders::table
                    .filter(wc_orders::wp_user_id.eq(key))
                    .order((
                        wc_orders::date_created.desc().nulls_last(),
                        wc_orders::wc_order_id.desc(),
                    ))
                    .select(WcOrderRow::as_select())
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
        wc_order_id: WcOrderId,
    ) -> Result<bool, StorePersistenceError> {
        let key = wc_order_id.get();
        let deleted = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(wc_orders::table.filter(wc_orders::wc_order_id.eq(key)))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn later_duplicates_replace_earlier_ones_in_place() {
        let batch = [(1, "a"), (2, "b"), (1, "c"), (3, "d")];

        let kept = last_per_key(&batch, |(id, _)| *id);

        assert_eq!(kept, vec![&(1, "c"), &(2, "b"), &(3, "d")]);
    }

    #[rstest]
    #[case(ORDER_COLUMNS, 3_855)]
    #[case(19, 3_449)]
    fn statements_stay_under_the_bind_limit(#[case] columns: usize, #[case] rows: usize) {
        assert_eq!(rows_per_statement(columns), rows);
        assert!(rows * columns <= MAX_BIND_PARAMS);
        assert!((rows + 1) * columns > MAX_BIND_PARAMS);
    }
}
