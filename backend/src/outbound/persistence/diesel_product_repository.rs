//! PostgreSQL-backed `ProductRepository` implementation.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;
use tracing::debug;

use crate::domain::ports::{ProductRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, WcProduct, WcProductId, WcProductSnapshot};

use super::caller_scope::run_as;
use super::diesel_order_repository::{last_per_key, rows_per_statement};
use super::models::{NewWcProductRow, WcProductRow, convert_rows};
use super::pool::DbPool;
use super::schema::wc_products;

// Bound columns per `wc_products` snapshot row, `synced_at` included.
const PRODUCT_COLUMNS: usize = 19;

async fn upsert_chunk(
    conn: &mut AsyncPgConnection,
    chunk: &[NewWcProductRow<'_>],
) -> QueryResult<usize> {
    diesel::insert_into(wc_products::table)
        .values(chunk)
        .on_conflict(wc_products::wc_product_id)
        .do_update()
        .set((
            (
                wc_products::name.eq(excluded(wc_products::name)),
                wc_products::slug.eq(excluded(wc_products::slug)),
                wc_products::status.eq(excluded(wc_products::status)),
                wc_products::product_type.eq(excluded(wc_products::product_type)),
                wc_products::description.eq(excluded(wc_products::description)),
                wc_products::short_description.eq(excluded(wc_products::short_description)),
                wc_products::sku.eq(excluded(wc_products::sku)),
                wc_products::price.eq(excluded(wc_products::price)),
                wc_products::regular_price.eq(excluded(wc_products::regular_price)),
            ),
            (
                wc_products::sale_price.eq(excluded(wc_products::sale_price)),
                wc_products::stock_status.eq(excluded(wc_products::stock_status)),
                wc_products::stock_quantity.eq(excluded(wc_products::stock_quantity)),
                wc_products::categories.eq(excluded(wc_products::categories)),
                wc_products::tags.eq(excluded(wc_products::tags)),
                wc_products::images.eq(excluded(wc_products::images)),
                wc_products::date_created.eq(excluded(wc_products::date_created)),
                wc_products::date_modified.eq(excluded(wc_products::date_modified)),
                wc_products::synced_at.eq(excluded(wc_products::synced_at)),
            ),
        ))
        .execute(conn)
        .await
}

/// Diesel-backed implementation of the [`ProductRepository`] port.
#[derive(Clone)]
pub struct DieselProductRepository {
    pool: DbPool,
}

impl DieselProductRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for DieselProductRepository {
    async fn upsert_snapshots(
        &self,
        caller: &CallerIdentity,
        snapshots: &[WcProductSnapshot],
    ) -> Result<usize, StorePersistenceError> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let synced_at = Utc::now();
        let rows: Vec<NewWcProductRow<'_>> = last_per_key(snapshots, |s| s.wc_product_id)
            .into_iter()
            .map(|snapshot| NewWcProductRow::from_snapshot(snapshot, synced_at))
            .collect();

        let written = run_as(&self.pool, caller, move |conn| {
            async move {
                let mut written = 0;
                for chunk in rows.chunks(rows_per_statement(PRODUCT_COLUMNS)) {
                    written += upsert_chunk(conn, chunk).await?;
                }
                Ok(written)
            }
            .scope_boxed()
        })
        .await?;

        debug!(received = snapshots.len(), written, "upserted product snapshots");
        Ok(written)
    }

    async fn insert(
        &self,
        caller: &CallerIdentity,
        snapshot: &WcProductSnapshot,
    ) -> Result<WcProduct, StorePersistenceError> {
        let row = NewWcProductRow::from_snapshot(snapshot, Utc::now());
        let stored: WcProductRow = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::insert_into(wc_products::table)
                    .values(&row)
                    .returning(WcProductRow::as_returning())
                    .get_result(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        WcProduct::try_from(stored)
    }

    async fn find_by_wc_product_id(
        &self,
        caller: &CallerIdentity,
        wc_product_id: WcProductId,
    ) -> Result<Option<WcProduct>, StorePersistenceError> {
        let key = wc_product_id.get();
        let row: Option<WcProductRow> = run_as(&self.pool, caller, move |conn| {
            async move {
                wc_products::table
                    .filter(wc_products::wc_product_id.eq(key))
                    .select(WcProductRow::as_select())
                    .first(conn)
                    .await
                    .optional()
            }
            .scope_boxed()
        })
        .await?;
        row.map(WcProduct::try_from).transpose()
    }

    async fn list(&self, caller: &CallerIdentity) -> Result<Vec<WcProduct>, StorePersistenceError> {
        let rows: Vec<WcProductRow> = run_as(&self.pool, caller, |conn| {
            async move {
                wc_products::table
                    .order(wc_products::wc_product_id.asc())
                    .select(WcProductRow::as_select())
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
        wc_product_id: WcProductId,
    ) -> Result<bool, StorePersistenceError> {
        let key = wc_product_id.get();
        let deleted = run_as(&self.pool, caller, move |conn| {
            async move {
                diesel::delete(wc_products::table.filter(wc_products::wc_product_id.eq(key)))
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;
        Ok(deleted > 0)
    }
}
