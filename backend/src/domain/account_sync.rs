//! Mirrors WordPress accounts into the store on login.

use std::sync::Arc;

use tracing::info;

use crate::domain::ports::{StorePersistenceError, WpUserRepository};
use crate::domain::{
    CallerIdentity, UpsertOutcome, WpUser, WpUserId, WpUserProfile,
    WpUserProfileUpdate, WpUserValidationError,
};

/// Failures raised while syncing an account.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountSyncError {
    /// The profile does not fit the schema.
    #[error(transparent)]
    Validation(#[from] WpUserValidationError),
    /// The store rejected the write.
    #[error(transparent)]
    Persistence(#[from] StorePersistenceError),
}

/// Account sync service.
#[derive(Clone)]
pub struct AccountSync<W> {
    users_repo: Arc<W>,
}

impl<W> AccountSync<W> {
    /// Create a service over the user repository.
    pub fn new(users_repo: Arc<W>) -> Self {
        Self { users_repo }
    }
}

impl<W> AccountSync<W>
where
    W: WpUserRepository,
{
    const CALLER: CallerIdentity = CallerIdentity::Service;

    /// Persist a successful login.
    ///
    /// The profile overwrites any stored copy. A user seen for the first time
    /// also gets a usage counter at zero, written in the same transaction.
    pub async fn record_login(
        &self,
        profile: &WpUserProfile,
    ) -> Result<UpsertOutcome, AccountSyncError> {
        profile.validate()?;
        let outcome = self
            .users_repo
            .upsert_with_usage_counter(&Self::CALLER, profile)
            .await?;
        if outcome == UpsertOutcome::Inserted {
            info!(wp_user_id = %profile.wp_user_id, "registered new account");
        }
        Ok(outcome)
    }

    /// Stored profile as seen by `caller`.
    pub async fn profile(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<WpUser>, AccountSyncError> {
        Ok(self
            .users_repo
            .find_by_wp_user_id(caller, wp_user_id)
            .await?)
    }

    /// Apply a partial profile update on the user's behalf.
    ///
    /// Returns `false` for an empty update or an unknown user.
    pub async fn update_profile(
        &self,
        wp_user_id: WpUserId,
        update: &WpUserProfileUpdate,
    ) -> Result<bool, AccountSyncError> {
        update.validate()?;
        if update.is_empty() {
            return Ok(false);
        }
        Ok(self
            .users_repo
            .update_profile(&Self::CALLER, wp_user_id, update)
            .await?)
    }
}
