//! Port abstraction for `wc_products` snapshots.

use async_trait::async_trait;

use crate::domain::{CallerIdentity, WcProduct, WcProductId, WcProductSnapshot};

use super::StorePersistenceError;

/// Port for synced WooCommerce products.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Overwrite or insert every snapshot keyed by `wc_product_id`,
    /// refreshing `synced_at`. Returns the number of rows written.
    async fn upsert_snapshots(
        &self,
        caller: &CallerIdentity,
        snapshots: &[WcProductSnapshot],
    ) -> Result<usize, StorePersistenceError>;

    /// Plain insert; a duplicate `wc_product_id` fails with
    /// [`StorePersistenceError::UniqueViolation`].
    async fn insert(
        &self,
        caller: &CallerIdentity,
        snapshot: &WcProductSnapshot,
    ) -> Result<WcProduct, StorePersistenceError>;

    /// Fetch a visible product by external identifier.
    async fn find_by_wc_product_id(
        &self,
        caller: &CallerIdentity,
        wc_product_id: WcProductId,
    ) -> Result<Option<WcProduct>, StorePersistenceError>;

    /// Every visible product ordered by external identifier.
    async fn list(&self, caller: &CallerIdentity)
    -> Result<Vec<WcProduct>, StorePersistenceError>;

    /// Delete a product by external identifier.
    async fn delete(
        &self,
        caller: &CallerIdentity,
        wc_product_id: WcProductId,
    ) -> Result<bool, StorePersistenceError>;
}
