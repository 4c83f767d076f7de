//! Read-side order reporting.

use std::sync::Arc;

use crate::domain::ports::{OrderRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, OrdersSummary, WpUserId};

/// Builds [`OrdersSummary`] values from synced orders.
///
/// Reads run as the supplied caller, so an end user summarising someone
/// else's orders simply sees none.
#[derive(Clone)]
pub struct OrdersService<O> {
    orders_repo: Arc<O>,
}

impl<O> OrdersService<O> {
    /// Create the service.
    pub fn new(orders_repo: Arc<O>) -> Self {
        Self { orders_repo }
    }
}

impl<O: OrderRepository> OrdersService<O> {
    /// Summary of the user's orders, `None` when none are visible.
    pub async fn summary_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<OrdersSummary>, StorePersistenceError> {
        let orders = self.orders_repo.list_for_user(caller, wp_user_id).await?;
        Ok(OrdersSummary::from_orders(orders))
    }
}
