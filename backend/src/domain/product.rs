//! WooCommerce product snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::WcProductId;

/// Upsert payload and stored body of a `wc_products` row.
///
/// Categories, tags and images are kept as the JSON arrays WooCommerce
/// returns; the store does not interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WcProductSnapshot {
    pub wc_product_id: WcProductId,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    /// WooCommerce product type (`simple`, `variable`, ...).
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
}

impl WcProductSnapshot {
    /// Snapshot with only the required key populated.
    pub fn new(wc_product_id: WcProductId) -> Self {
        Self {
            wc_product_id,
            name: None,
            slug: None,
            status: None,
            product_type: None,
            description: None,
            short_description: None,
            sku: None,
            price: None,
            regular_price: None,
            sale_price: None,
            stock_status: None,
            stock_quantity: None,
            categories: None,
            tags: None,
            images: None,
            date_created: None,
            date_modified: None,
        }
    }

    /// True when a sale price below the regular price is set.
    pub fn is_on_sale(&self) -> bool {
        match (self.sale_price, self.regular_price) {
            (Some(sale), Some(regular)) => sale < regular,
            _ => false,
        }
    }
}

/// Stored `wc_products` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WcProduct {
    pub record_id: i32,
    pub snapshot: WcProductSnapshot,
    pub synced_at: Option<DateTime<Utc>>,
}
