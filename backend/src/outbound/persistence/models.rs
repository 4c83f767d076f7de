//! Internal Diesel row structs and their conversions to domain records.
//!
//! Rows are never exposed outside the persistence module. Writes are
//! validated by the domain types, but the columns themselves only require
//! `INTEGER`/`VARCHAR`, so reads are lenient: a stored email that would not
//! validate is kept as written, and a list skips rows whose identifiers are
//! unusable. Both cases log a warning.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use crate::domain::ports::StorePersistenceError;
use crate::domain::{
    ApiUsage, EmailAddress, NewApiUsage, NewQueryHistoryEntry, NewUserSession, QueryHistoryEntry,
    UserSession, WcCustomerId, WcOrder, WcOrderId, WcOrderSnapshot, WcProduct, WcProductId,
    WcProductSnapshot, WpUser, WpUserId, WpUserProfile, WpUserProfileUpdate,
};

use super::schema::{api_usage, query_history, user_sessions, wc_orders, wc_products, wp_users};

/// Convert a stored value, logging and mapping invariant violations.
fn stored<T, E: Display>(
    table: &'static str,
    column: &'static str,
    result: Result<T, E>,
) -> Result<T, StorePersistenceError> {
    result.map_err(|error| {
        warn!(table, column, %error, "stored value violates domain invariant");
        StorePersistenceError::query(format!("invalid {table}.{column}: {error}"))
    })
}

/// Stored emails are kept even when they would fail validation on write.
fn stored_email(table: &'static str, record_id: i32, raw: String) -> EmailAddress {
    EmailAddress::new(raw.as_str()).unwrap_or_else(|error| {
        warn!(table, record_id, %error, "stored email violates domain invariant, keeping as written");
        EmailAddress::from_stored(raw)
    })
}

fn stored_user_id(
    table: &'static str,
    value: Option<i32>,
) -> Result<Option<WpUserId>, StorePersistenceError> {
    value
        .map(|raw| stored(table, "wp_user_id", WpUserId::try_from(raw)))
        .transpose()
}

// ---------------------------------------------------------------------------
// wp_users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = wp_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct WpUserRow {
    pub id: i32,
    pub wp_user_id: i32,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub roles: Option<Value>,
    pub capabilities: Option<Value>,
    pub wp_token: Option<String>,
    pub wp_token_expires: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<WpUserRow> for WpUser {
    type Error = StorePersistenceError;

    fn try_from(row: WpUserRow) -> Result<Self, Self::Error> {
        let profile = WpUserProfile {
            wp_user_id: stored("wp_users", "wp_user_id", WpUserId::try_from(row.wp_user_id))?,
            email: stored_email("wp_users", row.id, row.email),
            username: row.username,
            display_name: row.display_name,
            roles: row.roles,
            capabilities: row.capabilities,
            wp_token: row.wp_token,
            wp_token_expires: row.wp_token_expires,
            last_login: row.last_login,
        };
        Ok(Self {
            record_id: row.id,
            profile,
            created_at: row.created_at,
        })
    }
}

/// Insert and upsert payload; `created_at` is left to the column default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wp_users)]
pub(crate) struct NewWpUserRow<'a> {
    pub wp_user_id: i32,
    pub email: &'a str,
    pub username: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub roles: Option<&'a Value>,
    pub capabilities: Option<&'a Value>,
    pub wp_token: Option<&'a str>,
    pub wp_token_expires: Option<&'a str>,
    pub last_login: Option<DateTime<Utc>>,
}

impl<'a> From<&'a WpUserProfile> for NewWpUserRow<'a> {
    fn from(profile: &'a WpUserProfile) -> Self {
        Self {
            wp_user_id: profile.wp_user_id.get(),
            email: profile.email.as_str(),
            username: profile.username.as_deref(),
            display_name: profile.display_name.as_deref(),
            roles: profile.roles.as_ref(),
            capabilities: profile.capabilities.as_ref(),
            wp_token: profile.wp_token.as_deref(),
            wp_token_expires: profile.wp_token_expires.as_deref(),
            last_login: profile.last_login,
        }
    }
}

/// Partial update; `None` fields are skipped by Diesel.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = wp_users)]
pub(crate) struct WpUserChangeset<'a> {
    pub email: Option<&'a str>,
    pub username: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub roles: Option<&'a Value>,
    pub capabilities: Option<&'a Value>,
}

impl<'a> From<&'a WpUserProfileUpdate> for WpUserChangeset<'a> {
    fn from(update: &'a WpUserProfileUpdate) -> Self {
        Self {
            email: update.email.as_ref().map(EmailAddress::as_str),
            username: update.username.as_deref(),
            display_name: update.display_name.as_deref(),
            roles: update.roles.as_ref(),
            capabilities: update.capabilities.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// api_usage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = api_usage)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ApiUsageRow {
    pub id: i32,
    pub wp_user_id: Option<i32>,
    pub email: String,
    pub queries: Option<i32>,
    pub last_query: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Stored counts are never negative; a `NULL` or negative count reads as 0.
pub(crate) fn query_count(id: i32, raw: Option<i32>) -> u32 {
    let value = raw.unwrap_or_default();
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(record_id = id, value, "negative usage count, reading as zero");
        0
    })
}

impl TryFrom<ApiUsageRow> for ApiUsage {
    type Error = StorePersistenceError;

    fn try_from(row: ApiUsageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            record_id: row.id,
            wp_user_id: stored_user_id("api_usage", row.wp_user_id)?,
            email: stored_email("api_usage", row.id, row.email),
            queries: query_count(row.id, row.queries),
            last_query: row.last_query,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = api_usage)]
pub(crate) struct NewApiUsageRow<'a> {
    pub wp_user_id: Option<i32>,
    pub email: &'a str,
    pub queries: Option<i32>,
}

impl<'a> TryFrom<&'a NewApiUsage> for NewApiUsageRow<'a> {
    type Error = StorePersistenceError;

    fn try_from(usage: &'a NewApiUsage) -> Result<Self, Self::Error> {
        let queries = i32::try_from(usage.queries).map_err(|_| {
            StorePersistenceError::query(format!("usage count {} exceeds i32", usage.queries))
        })?;
        Ok(Self {
            wp_user_id: usage.wp_user_id.map(WpUserId::get),
            email: usage.email.as_str(),
            queries: Some(queries),
        })
    }
}

// ---------------------------------------------------------------------------
// query_history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = query_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct QueryHistoryRow {
    pub id: i32,
    pub wp_user_id: Option<i32>,
    pub email: String,
    pub query_type: Option<String>,
    pub query_data: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<QueryHistoryRow> for QueryHistoryEntry {
    type Error = StorePersistenceError;

    fn try_from(row: QueryHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            record_id: row.id,
            wp_user_id: stored_user_id("query_history", row.wp_user_id)?,
            email: stored_email("query_history", row.id, row.email),
            query_type: row.query_type,
            query_data: row.query_data,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = query_history)]
pub(crate) struct NewQueryHistoryRow<'a> {
    pub wp_user_id: Option<i32>,
    pub email: &'a str,
    pub query_type: Option<&'a str>,
    pub query_data: Option<&'a Value>,
}

impl<'a> From<&'a NewQueryHistoryEntry> for NewQueryHistoryRow<'a> {
    fn from(entry: &'a NewQueryHistoryEntry) -> Self {
        Self {
            wp_user_id: entry.wp_user_id.map(WpUserId::get),
            email: entry.email.as_str(),
            query_type: entry.query_type.as_deref(),
            query_data: entry.query_data.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// wc_orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = wc_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct WcOrderRow {
    pub id: i32,
    pub wc_order_id: i32,
    pub wp_user_id: Option<i32>,
    pub wc_customer_id: Option<i32>,
    pub status: Option<String>,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_total: Option<Decimal>,
    pub currency: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
    pub product_count: Option<i32>,
    pub product_names: Option<Value>,
    pub billing_email: Option<String>,
    pub billing_phone: Option<String>,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Read `product_names`; anything but an array of strings reads as empty.
fn product_names(order_id: i32, value: Option<Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw).unwrap_or_else(|error| {
            warn!(wc_order_id = order_id, %error, "unreadable product_names, ignoring");
            Vec::new()
        }),
    }
}

impl TryFrom<WcOrderRow> for WcOrder {
    type Error = StorePersistenceError;

    fn try_from(row: WcOrderRow) -> Result<Self, Self::Error> {
        let snapshot = WcOrderSnapshot {
            wc_order_id: stored("wc_orders", "wc_order_id", WcOrderId::try_from(row.wc_order_id))?,
            wp_user_id: stored_user_id("wc_orders", row.wp_user_id)?,
            wc_customer_id: row
                .wc_customer_id
                .map(|raw| stored("wc_orders", "wc_customer_id", WcCustomerId::try_from(raw)))
                .transpose()?,
            status: row.status,
            total: row.total,
            subtotal: row.subtotal,
            tax_total: row.tax_total,
            currency: row.currency,
            date_created: row.date_created,
            date_completed: row.date_completed,
            product_count: row.product_count,
            product_names: product_names(row.wc_order_id, row.product_names),
            billing_email: row.billing_email,
            billing_phone: row.billing_phone,
            shipping_method: row.shipping_method,
            payment_method: row.payment_method,
        };
        Ok(Self {
            record_id: row.id,
            snapshot,
            synced_at: row.synced_at,
        })
    }
}

/// Insert and upsert payload. `synced_at` is set explicitly so upserts
/// refresh it.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wc_orders)]
pub(crate) struct NewWcOrderRow<'a> {
    pub wc_order_id: i32,
    pub wp_user_id: Option<i32>,
    pub wc_customer_id: Option<i32>,
    pub status: Option<&'a str>,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_total: Option<Decimal>,
    pub currency: Option<&'a str>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
    pub product_count: Option<i32>,
    pub product_names: Option<Value>,
    pub billing_email: Option<&'a str>,
    pub billing_phone: Option<&'a str>,
    pub shipping_method: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub synced_at: DateTime<Utc>,
}

impl<'a> NewWcOrderRow<'a> {
    pub fn from_snapshot(snapshot: &'a WcOrderSnapshot, synced_at: DateTime<Utc>) -> Self {
        Self {
            wc_order_id: snapshot.wc_order_id.get(),
            wp_user_id: snapshot.wp_user_id.map(WpUserId::get),
            wc_customer_id: snapshot.wc_customer_id.map(WcCustomerId::get),
            status: snapshot.status.as_deref(),
            total: snapshot.total,
            subtotal: snapshot.subtotal,
            tax_total: snapshot.tax_total,
            currency: snapshot.currency.as_deref(),
            date_created: snapshot.date_created,
            date_completed: snapshot.date_completed,
            product_count: snapshot.product_count,
            product_names: Some(Value::from(snapshot.product_names.clone())),
            billing_email: snapshot.billing_email.as_deref(),
            billing_phone: snapshot.billing_phone.as_deref(),
            shipping_method: snapshot.shipping_method.as_deref(),
            payment_method: snapshot.payment_method.as_deref(),
            synced_at,
        }
    }
}

// ---------------------------------------------------------------------------
// wc_products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = wc_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct WcProductRow {
    pub id: i32,
    pub wc_product_id: i32,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub product_type: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock_status: Option<String>,
    pub stock_quantity: Option<i32>,
    pub categories: Option<Value>,
    pub tags: Option<Value>,
    pub images: Option<Value>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<WcProductRow> for WcProduct {
    type Error = StorePersistenceError;

    fn try_from(row: WcProductRow) -> Result<Self, Self::Error> {
        let snapshot = WcProductSnapshot {
            wc_product_id: stored(
                "wc_products",
                "wc_product_id",
                WcProductId::try_from(row.wc_product_id),
            )?,
            name: row.name,
            slug: row.slug,
            status: row.status,
            product_type: row.product_type,
            description: row.description,
            short_description: row.short_description,
            sku: row.sku,
            price: row.price,
            regular_price: row.regular_price,
            sale_price: row.sale_price,
            stock_status: row.stock_status,
            stock_quantity: row.stock_quantity,
            categories: row.categories,
            tags: row.tags,
            images: row.images,
            date_created: row.date_created,
            date_modified: row.date_modified,
        };
        Ok(Self {
            record_id: row.id,
            snapshot,
            synced_at: row.synced_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wc_products)]
pub(crate) struct NewWcProductRow<'a> {
    pub wc_product_id: i32,
    pub name: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub status: Option<&'a str>,
    pub product_type: Option<&'a str>,
    pub description: Option<&'a str>,
    pub short_description: Option<&'a str>,
    pub sku: Option<&'a str>,
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock_status: Option<&'a str>,
    pub stock_quantity: Option<i32>,
    pub categories: Option<&'a Value>,
    pub tags: Option<&'a Value>,
    pub images: Option<&'a Value>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
}

impl<'a> NewWcProductRow<'a> {
    pub fn from_snapshot(snapshot: &'a WcProductSnapshot, synced_at: DateTime<Utc>) -> Self {
        Self {
            wc_product_id: snapshot.wc_product_id.get(),
            name: snapshot.name.as_deref(),
            slug: snapshot.slug.as_deref(),
            status: snapshot.status.as_deref(),
            product_type: snapshot.product_type.as_deref(),
            description: snapshot.description.as_deref(),
            short_description: snapshot.short_description.as_deref(),
            sku: snapshot.sku.as_deref(),
            price: snapshot.price,
            regular_price: snapshot.regular_price,
            sale_price: snapshot.sale_price,
            stock_status: snapshot.stock_status.as_deref(),
            stock_quantity: snapshot.stock_quantity,
            categories: snapshot.categories.as_ref(),
            tags: snapshot.tags.as_ref(),
            images: snapshot.images.as_ref(),
            date_created: snapshot.date_created,
            date_modified: snapshot.date_modified,
            synced_at,
        }
    }
}

// ---------------------------------------------------------------------------
// user_sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserSessionRow {
    pub id: i32,
    pub wp_user_id: Option<i32>,
    pub last_login: Option<DateTime<Utc>>,
    pub session_data: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserSessionRow> for UserSession {
    type Error = StorePersistenceError;

    fn try_from(row: UserSessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            record_id: row.id,
            wp_user_id: stored_user_id("user_sessions", row.wp_user_id)?,
            last_login: row.last_login,
            session_data: row.session_data,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_sessions)]
pub(crate) struct NewUserSessionRow<'a> {
    pub wp_user_id: Option<i32>,
    pub last_login: Option<DateTime<Utc>>,
    pub session_data: Option<&'a Value>,
}

impl<'a> From<&'a NewUserSession> for NewUserSessionRow<'a> {
    fn from(session: &'a NewUserSession) -> Self {
        Self {
            wp_user_id: session.wp_user_id.map(WpUserId::get),
            last_login: session.last_login,
            session_data: session.session_data.as_ref(),
        }
    }
}

/// Convert a batch of rows, skipping any that cannot become a domain record.
///
/// The conversion has already logged which column was at fault.
pub(crate) fn convert_rows<R, T>(rows: Vec<R>) -> Vec<T>
where
    T: TryFrom<R, Error = StorePersistenceError>,
{
    let total = rows.len();
    let records: Vec<T> = rows
        .into_iter()
        .filter_map(|row| T::try_from(row).ok())
        .collect();
    if records.len() < total {
        warn!(skipped = total - records.len(), "skipped unreadable rows");
    }
    records
}
