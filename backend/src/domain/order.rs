//! WooCommerce order snapshots and the per-user order summary.
//!
//! Orders are point-in-time copies refreshed wholesale on every sync pass.
//! Line items are not modelled; `product_names` is a flat list captured at
//! sync time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::{WcCustomerId, WcOrderId, WpUserId};

/// Order status that counts towards completed orders.
pub const COMPLETED_STATUS: &str = "completed";

/// Number of recent orders carried by [`OrdersSummary`].
pub const RECENT_ORDERS_LIMIT: usize = 5;

/// Upsert payload and stored body of a `wc_orders` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcOrderSnapshot {
    pub wc_order_id: WcOrderId,
    pub wp_user_id: Option<WpUserId>,
    pub wc_customer_id: Option<WcCustomerId>,
    pub status: Option<String>,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_total: Option<Decimal>,
    pub currency: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
    pub product_count: Option<i32>,
    pub product_names: Vec<String>,
    pub billing_email: Option<String>,
    pub billing_phone: Option<String>,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
}

impl WcOrderSnapshot {
    /// Snapshot with only the required key populated.
    pub fn new(wc_order_id: WcOrderId) -> Self {
        Self {
            wc_order_id,
            wp_user_id: None,
            wc_customer_id: None,
            status: None,
            total: None,
            subtotal: None,
            tax_total: None,
            currency: None,
            date_created: None,
            date_completed: None,
            product_count: None,
            product_names: Vec::new(),
            billing_email: None,
            billing_phone: None,
            shipping_method: None,
            payment_method: None,
        }
    }

    /// True when the order reached the completed state.
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some(COMPLETED_STATUS)
    }
}

/// Stored `wc_orders` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcOrder {
    pub record_id: i32,
    pub snapshot: WcOrderSnapshot,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Aggregate view of a user's synced orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdersSummary {
    pub total_orders: usize,
    /// Sum of order totals; orders without a total count as zero.
    pub total_spent: Decimal,
    pub completed_orders: usize,
    /// At most [`RECENT_ORDERS_LIMIT`] orders, newest `date_created` first.
    pub recent_orders: Vec<WcOrder>,
}

impl OrdersSummary {
    /// Summarise a user's orders; `None` when the user has none.
    ///
    /// Orders without a creation date sort after dated ones.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::{OrdersSummary, WcOrder, WcOrderId, WcOrderSnapshot};
    ///
    /// assert!(OrdersSummary::from_orders(Vec::new()).is_none());
    ///
    /// let mut snapshot = WcOrderSnapshot::new(WcOrderId::new(1).expect("valid id"));
    /// snapshot.status = Some("completed".to_owned());
    /// let order = WcOrder { record_id: 1, snapshot, synced_at: None };
    /// let summary = OrdersSummary::from_orders(vec![order]).expect("one order");
    /// assert_eq!(summary.completed_orders, 1);
    /// ```
    pub fn from_orders(orders: Vec<WcOrder>) -> Option<Self> {
        if orders.is_empty() {
            return None;
        }

        let total_orders = orders.len();
        let total_spent = orders
            .iter()
            .filter_map(|order| order.snapshot.total)
            .sum::<Decimal>();
        let completed_orders = orders
            .iter()
            .filter(|order| order.snapshot.is_completed())
            .count();

        let mut recent_orders = orders;
        recent_orders.sort_by(|left, right| {
            right
                .snapshot
                .date_created
                .cmp(&left.snapshot.date_created)
        });
        recent_orders.truncate(RECENT_ORDERS_LIMIT);

        Some(Self {
            total_orders,
            total_spent,
            completed_orders,
            recent_orders,
        })
    }
}
