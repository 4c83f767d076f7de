//! Domain records, access model and services for the commerce sync store.
//!
//! Purpose: describe what the store holds and who may see it, independent of
//! Diesel or PostgreSQL. Adapters in `outbound` implement the traits in
//! [`ports`].
//!
//! Public surface:
//! - identifiers and records for the six collections;
//! - [`CallerIdentity`], the caller class every repository call runs under;
//! - services: [`UsageTracker`], [`AccountSync`], [`OrdersService`],
//!   [`SessionCleanup`];
//! - schema tooling: [`SchemaSnapshot`], [`SchemaAuditReport`] and
//!   [`render_mermaid_er_diagram`].

pub mod access;
pub mod account_sync;
pub mod er_diagram;
pub mod identifiers;
pub mod order;
pub mod orders_service;
pub mod ports;
pub mod product;
pub mod schema_audit;
pub mod schema_contract;
pub mod schema_snapshot;
pub mod session;
pub mod session_cleanup;
pub mod usage;
pub mod usage_tracker;
pub mod wp_user;

pub use self::access::{CURRENT_USER_SETTING, CallerIdentity, DatabaseRole};
pub use self::account_sync::{AccountSync, AccountSyncError};
pub use self::er_diagram::{dependents_by_table, render_mermaid_er_diagram};
pub use self::identifiers::{
    EMAIL_MAX, EmailAddress, IdentifierValidationError, WcCustomerId, WcOrderId, WcProductId,
    WpUserId,
};
pub use self::order::{COMPLETED_STATUS, OrdersSummary, RECENT_ORDERS_LIMIT, WcOrder, WcOrderSnapshot};
pub use self::orders_service::OrdersService;
pub use self::product::{WcProduct, WcProductSnapshot};
pub use self::schema_audit::{
    SchemaAdvisory, SchemaAuditReport, SchemaAuditService, SchemaViolation, audit_schema_contract,
};
pub use self::schema_contract::{SchemaContract, TableContract};
pub use self::schema_snapshot::{
    PolicyCommand, SchemaColumn, SchemaGrant, SchemaIndex, SchemaPolicy, SchemaRelationship,
    SchemaSnapshot, SchemaTable, SchemaUniqueConstraint,
};
pub use self::session::{
    DEFAULT_SESSION_RETENTION_DAYS, NewUserSession, SessionRetention, UserSession,
};
pub use self::session_cleanup::SessionCleanup;
pub use self::usage::{
    ApiUsage, DEFAULT_USAGE_LIMIT, NewApiUsage, NewQueryHistoryEntry, QUERY_TYPE_MAX,
    QueryHistoryEntry, QueryHistoryValidationError, UsageHistory, UsageLimit,
};
pub use self::usage_tracker::{DEFAULT_HISTORY_PAGE_SIZE, UsageTracker};
pub use self::wp_user::{
    DISPLAY_NAME_MAX, TOKEN_EXPIRY_MAX, USERNAME_MAX, UpsertOutcome, WpUser, WpUserProfile,
    WpUserProfileUpdate, WpUserValidationError,
};
