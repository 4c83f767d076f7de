//! Periodic purge of stale login sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::ports::{SessionRepository, StorePersistenceError};
use crate::domain::{CallerIdentity, SessionRetention};

/// Deletes sessions whose last login falls outside the retention window.
#[derive(Clone)]
pub struct SessionCleanup<S> {
    sessions_repo: Arc<S>,
    retention: SessionRetention,
}

impl<S> SessionCleanup<S> {
    /// Create a cleanup job with the given retention window.
    pub fn new(sessions_repo: Arc<S>, retention: SessionRetention) -> Self {
        Self {
            sessions_repo,
            retention,
        }
    }
}

impl<S: SessionRepository> SessionCleanup<S> {
    /// Purge sessions that expired as of `now`; returns how many were removed.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<usize, StorePersistenceError> {
        let Some(cutoff) = self.retention.cutoff(now) else {
            info!(
                retention_days = self.retention.window_days(),
                "retention window predates every stored session, nothing to purge"
            );
            return Ok(0);
        };
        let removed = self
            .sessions_repo
            .delete_last_login_before(&CallerIdentity::service(), cutoff)
            .await?;
        info!(
            removed,
            retention_days = self.retention.window_days(),
            %cutoff,
            "purged stale sessions"
        );
        Ok(removed)
    }
}
