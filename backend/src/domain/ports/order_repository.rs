//! Port abstraction for `wc_orders` snapshots.

use async_trait::async_trait;

use crate::domain::{CallerIdentity, WcOrder, WcOrderId, WcOrderSnapshot, WpUserId};

use super::StorePersistenceError;

/// Port for synced WooCommerce orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Overwrite or insert every snapshot keyed by `wc_order_id` in one
    /// statement, refreshing `synced_at`. Returns the number of rows written.
    async fn upsert_snapshots(
        &self,
        caller: &CallerIdentity,
        snapshots: &[WcOrderSnapshot],
    ) -> Result<usize, StorePersistenceError>;

    /// Plain insert; a duplicate `wc_order_id` fails with
    /// [`StorePersistenceError::UniqueViolation`].
    async fn insert(
        &self,
        caller: &CallerIdentity,
        snapshot: &WcOrderSnapshot,
    ) -> Result<WcOrder, StorePersistenceError>;

    /// Fetch a visible order by external identifier.
    async fn find_by_wc_order_id(
        &self,
        caller: &CallerIdentity,
        wc_order_id: WcOrderId,
    ) -> Result<Option<WcOrder>, StorePersistenceError>;

    /// Visible orders linked to a user.
    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<WcOrder>, StorePersistenceError>;

    /// Delete an order by external identifier.
    async fn delete(
        &self,
        caller: &CallerIdentity,
        wc_order_id: WcOrderId,
    ) -> Result<bool, StorePersistenceError>;
}
