//! Port abstraction for `api_usage` counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ApiUsage, CallerIdentity, NewApiUsage, WpUserId};

use super::StorePersistenceError;

/// Port for per-user query counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiUsageRepository: Send + Sync {
    /// Append a counter row unconditionally. The table has no dedup key; use
    /// [`ApiUsageRepository::find_or_create`] when the user needs exactly one.
    async fn create(
        &self,
        caller: &CallerIdentity,
        usage: &NewApiUsage,
    ) -> Result<ApiUsage, StorePersistenceError>;

    /// Oldest counter for `usage.wp_user_id`, creating `usage` when the user
    /// has none. Concurrent calls for one user create at most one counter.
    async fn find_or_create(
        &self,
        caller: &CallerIdentity,
        usage: &NewApiUsage,
    ) -> Result<ApiUsage, StorePersistenceError>;

    /// Oldest visible counter for the user.
    async fn find_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<ApiUsage>, StorePersistenceError>;

    /// Every visible counter for the user, oldest first.
    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<ApiUsage>, StorePersistenceError>;

    /// Atomically add one query to the user's counters and stamp
    /// `last_query`. Returns the new count, or `None` when no counter exists.
    async fn increment(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        at: DateTime<Utc>,
    ) -> Result<Option<u32>, StorePersistenceError>;

    /// Delete every counter row for the user; returns the number removed.
    async fn delete_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<usize, StorePersistenceError>;
}
