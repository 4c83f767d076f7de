//! WordPress user records mirrored into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::{EmailAddress, WpUserId};

/// Maximum length of the `username` column.
pub const USERNAME_MAX: usize = 100;
/// Maximum length of the `display_name` column.
pub const DISPLAY_NAME_MAX: usize = 255;
/// Maximum length of the `wp_token_expires` column.
pub const TOKEN_EXPIRY_MAX: usize = 50;

/// Validation errors for user profiles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WpUserValidationError {
    /// A text field is longer than its column.
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
}

fn check_length(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), WpUserValidationError> {
    match value {
        Some(text) if text.chars().count() > max => {
            Err(WpUserValidationError::TooLong { field, max })
        }
        _ => Ok(()),
    }
}

/// Profile written on every login sync; the upsert payload for `wp_users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WpUserProfile {
    pub wp_user_id: WpUserId,
    pub email: EmailAddress,
    pub username: Option<String>,
    pub display_name: Option<String>,
    /// WordPress role names, kept as the raw JSON the CMS returned.
    pub roles: Option<Value>,
    pub capabilities: Option<Value>,
    pub wp_token: Option<String>,
    /// Expiry exactly as issued by the token endpoint (free-form text).
    pub wp_token_expires: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

impl WpUserProfile {
    /// Minimal profile carrying only the required columns.
    pub fn new(wp_user_id: WpUserId, email: EmailAddress) -> Self {
        Self {
            wp_user_id,
            email,
            username: None,
            display_name: None,
            roles: None,
            capabilities: None,
            wp_token: None,
            wp_token_expires: None,
            last_login: None,
        }
    }

    /// Check text fields against their column widths.
    pub fn validate(&self) -> Result<(), WpUserValidationError> {
        check_length("username", self.username.as_deref(), USERNAME_MAX)?;
        check_length("display_name", self.display_name.as_deref(), DISPLAY_NAME_MAX)?;
        check_length(
            "wp_token_expires",
            self.wp_token_expires.as_deref(),
            TOKEN_EXPIRY_MAX,
        )
    }
}

/// Stored `wp_users` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WpUser {
    /// Surrogate primary key.
    pub record_id: i32,
    pub profile: WpUserProfile,
    pub created_at: Option<DateTime<Utc>>,
}

impl WpUser {
    /// External identifier of this user.
    pub fn wp_user_id(&self) -> WpUserId {
        self.profile.wp_user_id
    }
}

/// Partial profile update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WpUserProfileUpdate {
    pub email: Option<EmailAddress>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub roles: Option<Value>,
    pub capabilities: Option<Value>,
}

impl WpUserProfileUpdate {
    /// True when the update would not change any column.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.display_name.is_none()
            && self.roles.is_none()
            && self.capabilities.is_none()
    }

    /// Check text fields against their column widths.
    pub fn validate(&self) -> Result<(), WpUserValidationError> {
        check_length("username", self.username.as_deref(), USERNAME_MAX)?;
        check_length("display_name", self.display_name.as_deref(), DISPLAY_NAME_MAX)
    }
}

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the external identifier.
    Inserted,
    /// An existing row was overwritten.
    Updated,
}
