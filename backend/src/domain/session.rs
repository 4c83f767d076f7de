//! Loosely linked login sessions and their retention window.

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::WpUserId;

/// Default number of days a session survives without a newer login.
pub const DEFAULT_SESSION_RETENTION_DAYS: u32 = 7;

// PostgreSQL timestamps start in 4713 BC (proleptic Gregorian year -4712).
const EARLIEST_STORED_YEAR: i32 = -4712;

/// Stored `user_sessions` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub record_id: i32,
    pub wp_user_id: Option<WpUserId>,
    pub last_login: Option<DateTime<Utc>>,
    pub session_data: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for recording a session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserSession {
    pub wp_user_id: Option<WpUserId>,
    pub last_login: Option<DateTime<Utc>>,
    pub session_data: Option<Value>,
}

/// Age after which sessions are purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRetention {
    days: u32,
}

impl SessionRetention {
    /// Retain sessions for `days` days after their last login.
    pub const fn days(days: u32) -> Self {
        Self { days }
    }

    /// Configured window in days.
    pub const fn window_days(self) -> u32 {
        self.days
    }

    /// Sessions whose `last_login` is strictly before this instant expire.
    ///
    /// `None` when the window reaches back past any timestamp the store can
    /// hold, so nothing is old enough to expire.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use woo_sync_store::domain::SessionRetention;
    ///
    /// let now = Utc.with_ymd_and_hms(2025, 5, 8, 0, 0, 0).single().expect("date");
    /// let cutoff = SessionRetention::default().cutoff(now);
    /// assert_eq!(cutoff, Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).single());
    /// assert_eq!(SessionRetention::days(u32::MAX).cutoff(now), None);
    /// ```
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        TimeDelta::try_days(i64::from(self.days))
            .and_then(|window| now.checked_sub_signed(window))
            .filter(|cutoff| cutoff.year() >= EARLIEST_STORED_YEAR)
    }
}

impl Default for SessionRetention {
    fn default() -> Self {
        Self::days(DEFAULT_SESSION_RETENTION_DAYS)
    }
}
