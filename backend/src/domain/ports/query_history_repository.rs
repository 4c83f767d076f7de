//! Port abstraction for the append-only `query_history` log.

use async_trait::async_trait;

use crate::domain::{CallerIdentity, NewQueryHistoryEntry, QueryHistoryEntry, WpUserId};

use super::StorePersistenceError;

/// Port for the query log. Entries are never updated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryHistoryRepository: Send + Sync {
    /// Append an entry stamped with the database clock.
    async fn append(
        &self,
        caller: &CallerIdentity,
        entry: &NewQueryHistoryEntry,
    ) -> Result<QueryHistoryEntry, StorePersistenceError>;

    /// Newest visible entries for a user, at most `limit`.
    async fn recent_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        limit: u32,
    ) -> Result<Vec<QueryHistoryEntry>, StorePersistenceError>;

    /// Delete a single entry by surrogate key.
    async fn delete(
        &self,
        caller: &CallerIdentity,
        record_id: i32,
    ) -> Result<bool, StorePersistenceError>;
}
