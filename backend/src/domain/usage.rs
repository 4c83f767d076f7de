//! Per-user query counters and the append-only query history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::{EmailAddress, WpUserId};

/// Default number of queries a user may run.
pub const DEFAULT_USAGE_LIMIT: u32 = 30;

/// Maximum length of the `query_type` column.
pub const QUERY_TYPE_MAX: usize = 100;

/// Stored `api_usage` row.
///
/// Several rows may exist for one user because the table carries no dedup
/// key; readers treat the oldest row as authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUsage {
    pub record_id: i32,
    pub wp_user_id: Option<WpUserId>,
    pub email: EmailAddress,
    /// Stored value; a `NULL` column reads as zero.
    pub queries: u32,
    pub last_query: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating a usage counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApiUsage {
    pub wp_user_id: Option<WpUserId>,
    pub email: EmailAddress,
    pub queries: u32,
}

impl NewApiUsage {
    /// Fresh counter starting at zero.
    pub fn starting_at_zero(wp_user_id: WpUserId, email: EmailAddress) -> Self {
        Self {
            wp_user_id: Some(wp_user_id),
            email,
            queries: 0,
        }
    }
}

/// Usage cap checked before running a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimit(u32);

impl UsageLimit {
    /// Wrap a raw limit.
    pub const fn new(limit: u32) -> Self {
        Self(limit)
    }

    /// Raw limit value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// True while `current` queries leave room for another one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::UsageLimit;
    ///
    /// let limit = UsageLimit::default();
    /// assert!(limit.allows(29));
    /// assert!(!limit.allows(30));
    /// ```
    pub const fn allows(self, current: u32) -> bool {
        current < self.0
    }
}

impl Default for UsageLimit {
    fn default() -> Self {
        Self(DEFAULT_USAGE_LIMIT)
    }
}

/// Validation errors for history entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryHistoryValidationError {
    /// Category label exceeds the column width.
    #[error("query type exceeds {max} characters")]
    QueryTypeTooLong { max: usize },
}

/// Stored `query_history` row. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub record_id: i32,
    pub wp_user_id: Option<WpUserId>,
    pub email: EmailAddress,
    pub query_type: Option<String>,
    pub query_data: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for appending to the history log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueryHistoryEntry {
    pub wp_user_id: Option<WpUserId>,
    pub email: EmailAddress,
    pub query_type: Option<String>,
    pub query_data: Option<Value>,
}

impl NewQueryHistoryEntry {
    /// Build an entry for a user, validating the category label.
    pub fn new(
        wp_user_id: WpUserId,
        email: EmailAddress,
        query_type: impl Into<String>,
        query_data: Value,
    ) -> Result<Self, QueryHistoryValidationError> {
        let query_type = query_type.into();
        if query_type.chars().count() > QUERY_TYPE_MAX {
            return Err(QueryHistoryValidationError::QueryTypeTooLong {
                max: QUERY_TYPE_MAX,
            });
        }
        Ok(Self {
            wp_user_id: Some(wp_user_id),
            email,
            query_type: Some(query_type),
            query_data: Some(query_data),
        })
    }
}

/// Counter plus recent history, as shown on a usage dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageHistory {
    pub usage: Option<ApiUsage>,
    /// Newest first.
    pub history: Vec<QueryHistoryEntry>,
}
