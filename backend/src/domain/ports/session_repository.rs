//! Port abstraction for `user_sessions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CallerIdentity, NewUserSession, UserSession, WpUserId};

use super::StorePersistenceError;

/// Port for loosely linked session records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Record a session.
    async fn record(
        &self,
        caller: &CallerIdentity,
        session: &NewUserSession,
    ) -> Result<UserSession, StorePersistenceError>;

    /// Visible sessions for a user, most recent login first.
    async fn list_for_user(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Vec<UserSession>, StorePersistenceError>;

    /// Delete sessions whose `last_login` is before `cutoff`; returns the
    /// number removed. Sessions without a login time are kept.
    async fn delete_last_login_before(
        &self,
        caller: &CallerIdentity,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorePersistenceError>;
}
