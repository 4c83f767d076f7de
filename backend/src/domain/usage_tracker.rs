//! Per-user query metering.
//!
//! Runs as the service caller: end users have no write access to
//! `api_usage` or `query_history`, so metering is always done on their
//! behalf.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::ports::{ApiUsageRepository, QueryHistoryRepository, StorePersistenceError};
use crate::domain::{
    ApiUsage, CallerIdentity, EmailAddress, NewApiUsage, NewQueryHistoryEntry, QueryHistoryEntry,
    UsageHistory, UsageLimit, WpUserId,
};

/// Default number of history entries returned with a usage dashboard.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// Usage counters and the query log behind one service.
#[derive(Clone)]
pub struct UsageTracker<U, H> {
    usage_repo: Arc<U>,
    history_repo: Arc<H>,
    limit: UsageLimit,
    history_page_size: u32,
}

impl<U, H> UsageTracker<U, H> {
    /// Create a tracker with the default limit and history page size.
    pub fn new(usage_repo: Arc<U>, history_repo: Arc<H>) -> Self {
        Self {
            usage_repo,
            history_repo,
            limit: UsageLimit::default(),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    /// Override the query cap.
    #[must_use]
    pub fn with_limit(mut self, limit: UsageLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Override how many history entries [`UsageTracker::usage_history`]
    /// returns.
    #[must_use]
    pub fn with_history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = size;
        self
    }

    /// Configured query cap.
    pub fn limit(&self) -> UsageLimit {
        self.limit
    }

    pub fn history_page_size(&self) -> u32 {
        self.history_page_size
    }
}

impl<U, H> UsageTracker<U, H>
where
    U: ApiUsageRepository,
    H: QueryHistoryRepository,
{
    const CALLER: CallerIdentity = CallerIdentity::Service;

    /// Ensure a counter exists for the user, returning it.
    ///
    /// The common case is a plain read; creation goes through
    /// [`ApiUsageRepository::find_or_create`], so racing first reads still
    /// leave one counter.
    pub async fn initialize(
        &self,
        wp_user_id: WpUserId,
        email: &EmailAddress,
    ) -> Result<ApiUsage, StorePersistenceError> {
        if let Some(existing) = self
            .usage_repo
            .find_for_user(&Self::CALLER, wp_user_id)
            .await?
        {
            return Ok(existing);
        }

        let counter = self
            .usage_repo
            .find_or_create(
                &Self::CALLER,
                &NewApiUsage::starting_at_zero(wp_user_id, email.clone()),
            )
            .await?;
        info!(%wp_user_id, "initialized usage counter");
        Ok(counter)
    }

    /// Current query count; a user without a counter gets one at zero.
    pub async fn current_usage(
        &self,
        wp_user_id: WpUserId,
        email: &EmailAddress,
    ) -> Result<u32, StorePersistenceError> {
        Ok(self.initialize(wp_user_id, email).await?.queries)
    }

    /// Record one more query at `at` and return the new count.
    pub async fn increment(
        &self,
        wp_user_id: WpUserId,
        email: &EmailAddress,
        at: DateTime<Utc>,
    ) -> Result<u32, StorePersistenceError> {
        if let Some(count) = self
            .usage_repo
            .increment(&Self::CALLER, wp_user_id, at)
            .await?
        {
            return Ok(count);
        }

        self.initialize(wp_user_id, email).await?;
        self.usage_repo
            .increment(&Self::CALLER, wp_user_id, at)
            .await?
            .ok_or_else(|| {
                StorePersistenceError::query(format!(
                    "usage counter for user {wp_user_id} disappeared during increment"
                ))
            })
    }

    /// Append a query to the log.
    pub async fn log_query(
        &self,
        entry: &NewQueryHistoryEntry,
    ) -> Result<QueryHistoryEntry, StorePersistenceError> {
        let stored = self.history_repo.append(&Self::CALLER, entry).await?;
        debug!(record_id = stored.record_id, "logged query");
        Ok(stored)
    }

    /// Counter plus the newest history entries.
    pub async fn usage_history(
        &self,
        wp_user_id: WpUserId,
    ) -> Result<UsageHistory, StorePersistenceError> {
        let usage = self
            .usage_repo
            .find_for_user(&Self::CALLER, wp_user_id)
            .await?;
        let history = self
            .history_repo
            .recent_for_user(&Self::CALLER, wp_user_id, self.history_page_size)
            .await?;
        Ok(UsageHistory { usage, history })
    }

    /// True while the user may run another query.
    pub async fn is_within_limit(
        &self,
        wp_user_id: WpUserId,
        email: &EmailAddress,
    ) -> Result<bool, StorePersistenceError> {
        let current = self.current_usage(wp_user_id, email).await?;
        Ok(self.limit.allows(current))
    }
}
