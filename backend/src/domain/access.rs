//! Caller classes recognised by the row-level-security layer.
//!
//! Access control is evaluated by the database per statement. The store only
//! has to tell the engine *who* is asking: which platform role the statement
//! runs as, and which WordPress user the caller asserts to be.

use std::fmt;

use super::identifiers::WpUserId;

/// Session setting compared against `wp_user_id` by ownership policies.
pub const CURRENT_USER_SETTING: &str = "app.current_user_id";

/// Platform roles consumed by the schema. Both are provisioned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseRole {
    /// Read-limited end-user role.
    Authenticated,
    /// Unrestricted role used by sync jobs and trusted services.
    Service,
}

impl DatabaseRole {
    /// Role name as known to PostgreSQL.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Service => "service_role",
        }
    }

    /// All roles the schema references.
    pub const ALL: [Self; 2] = [Self::Authenticated, Self::Service];
}

impl fmt::Display for DatabaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a statement executes under.
///
/// # Examples
///
/// ```rust
/// use woo_sync_store::domain::{CallerIdentity, DatabaseRole, WpUserId};
///
/// let caller = CallerIdentity::authenticated(WpUserId::new(7).expect("valid id"));
/// assert_eq!(caller.role(), DatabaseRole::Authenticated);
/// assert_eq!(caller.asserted_user_setting(), "7");
///
/// let service = CallerIdentity::service();
/// assert_eq!(service.asserted_user_setting(), "");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerIdentity {
    /// End user asserting a WordPress identity.
    Authenticated(WpUserId),
    /// Privileged service caller; no identity is asserted.
    Service,
}

impl CallerIdentity {
    /// End-user caller for the given WordPress user.
    pub const fn authenticated(user: WpUserId) -> Self {
        Self::Authenticated(user)
    }

    /// Service caller.
    pub const fn service() -> Self {
        Self::Service
    }

    /// Platform role the statement runs as.
    pub const fn role(&self) -> DatabaseRole {
        match self {
            Self::Authenticated(_) => DatabaseRole::Authenticated,
            Self::Service => DatabaseRole::Service,
        }
    }

    /// Value written to [`CURRENT_USER_SETTING`] for this caller.
    ///
    /// Service callers clear the setting so a stale identity from a pooled
    /// connection can never leak into ownership checks.
    pub fn asserted_user_setting(&self) -> String {
        match self {
            Self::Authenticated(user) => user.to_string(),
            Self::Service => String::new(),
        }
    }

    /// True for the unrestricted caller class.
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(user) => write!(f, "authenticated:{user}"),
            Self::Service => f.write_str("service"),
        }
    }
}
