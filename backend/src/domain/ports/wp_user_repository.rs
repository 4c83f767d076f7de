//! Port abstraction for `wp_users` persistence.

use async_trait::async_trait;

use crate::domain::{
    CallerIdentity, EmailAddress, UpsertOutcome, WpUser, WpUserId, WpUserProfile,
    WpUserProfileUpdate,
};

use super::StorePersistenceError;

/// Port for WordPress user records.
///
/// Every method runs under the supplied caller so row-level security decides
/// what is visible and writable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WpUserRepository: Send + Sync {
    /// Insert or overwrite the user keyed by `wp_user_id`.
    ///
    /// `created_at` is only set on insert.
    async fn upsert(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<UpsertOutcome, StorePersistenceError>;

    /// Upsert the profile and make sure the user owns a usage counter, both
    /// in one transaction. A new user gets a counter at zero; an existing
    /// user missing one gets it too. The outcome reports whether this call
    /// inserted the user, so concurrent first logins see one `Inserted`.
    async fn upsert_with_usage_counter(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<UpsertOutcome, StorePersistenceError>;

    /// Plain insert; a duplicate `wp_user_id` fails with
    /// [`StorePersistenceError::UniqueViolation`].
    async fn insert(
        &self,
        caller: &CallerIdentity,
        profile: &WpUserProfile,
    ) -> Result<WpUser, StorePersistenceError>;

    /// Fetch a visible user by external identifier.
    async fn find_by_wp_user_id(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<Option<WpUser>, StorePersistenceError>;

    /// Fetch visible users sharing an email address.
    async fn find_by_email(
        &self,
        caller: &CallerIdentity,
        email: &EmailAddress,
    ) -> Result<Vec<WpUser>, StorePersistenceError>;

    /// List every visible user ordered by external identifier.
    async fn list(&self, caller: &CallerIdentity) -> Result<Vec<WpUser>, StorePersistenceError>;

    /// Apply a partial update. Returns `false` when no visible row matched.
    async fn update_profile(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
        update: &WpUserProfileUpdate,
    ) -> Result<bool, StorePersistenceError>;

    /// Delete a user. Returns `false` when no visible row matched.
    async fn delete(
        &self,
        caller: &CallerIdentity,
        wp_user_id: WpUserId,
    ) -> Result<bool, StorePersistenceError>;
}
