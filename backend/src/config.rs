//! Store settings loaded via OrthoConfig.
//!
//! Values come from `WOO_STORE_*` environment variables or a configuration
//! file. Anything left unset takes the domain default.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{
    DEFAULT_HISTORY_PAGE_SIZE, DEFAULT_SESSION_RETENTION_DAYS, DEFAULT_USAGE_LIMIT,
    SessionRetention, UsageLimit, UsageTracker,
};
use crate::outbound::persistence::PoolConfig;

/// Settings could not be loaded or are incomplete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {message}")]
    Load { message: String },

    #[error("WOO_STORE_DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

/// Configuration for the store and its admin tooling.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WOO_STORE")]
pub struct StoreSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub pool_max_size: Option<u32>,
    /// Idle connections kept warm.
    pub pool_min_idle: Option<u32>,
    /// Checkout timeout in seconds.
    pub connection_timeout_secs: Option<u64>,
    /// Queries allowed per user before `is_within_limit` fails.
    pub usage_query_limit: Option<u32>,
    /// Days a session survives after its last login.
    pub session_retention_days: Option<u32>,
    /// Query history entries returned with usage.
    pub history_page_size: Option<u32>,
}

impl StoreSettings {
    /// Load from the environment and configuration files only; command-line
    /// arguments belong to the CLI parser.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Load`] when a value fails to parse.
    pub fn load_from_environment() -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from("store-admin")]).map_err(|error| {
            SettingsError::Load {
                message: error.to_string(),
            }
        })
    }

    /// Configured connection URL.
    ///
    /// # Errors
    ///
    /// [`SettingsError::MissingDatabaseUrl`] when unset.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .ok_or(SettingsError::MissingDatabaseUrl)
    }

    /// Pool settings for [`DbPool::new`](crate::outbound::persistence::DbPool::new).
    ///
    /// # Errors
    ///
    /// [`SettingsError::MissingDatabaseUrl`] when no URL is configured.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let mut config = PoolConfig::new(self.database_url()?);
        if let Some(max_size) = self.pool_max_size {
            config = config.with_max_size(max_size);
        }
        if let Some(min_idle) = self.pool_min_idle {
            config = config.with_min_idle(Some(min_idle));
        }
        if let Some(secs) = self.connection_timeout_secs {
            config = config.with_connection_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Per-user query cap, [`DEFAULT_USAGE_LIMIT`] when unset.
    pub fn usage_limit(&self) -> UsageLimit {
        UsageLimit::new(self.usage_query_limit.unwrap_or(DEFAULT_USAGE_LIMIT))
    }

    /// Window used by `store-admin cleanup-sessions`.
    /// [`DEFAULT_SESSION_RETENTION_DAYS`] when unset.
    pub fn session_retention(&self) -> SessionRetention {
        SessionRetention::days(
            self.session_retention_days
                .unwrap_or(DEFAULT_SESSION_RETENTION_DAYS),
        )
    }

    /// History entries per usage page, [`DEFAULT_HISTORY_PAGE_SIZE`] when
    /// unset.
    pub fn history_page_size(&self) -> u32 {
        self.history_page_size.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE)
    }

    /// A [`UsageTracker`] carrying the configured limit and history page
    /// size.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// # use woo_sync_store::StoreSettings;
    /// # use woo_sync_store::domain::UsageLimit;
    /// # fn tracker_for<U, H>(usage: Arc<U>, history: Arc<H>) {
    /// let settings = StoreSettings {
    ///     usage_query_limit: Some(5),
    ///     ..StoreSettings::default()
    /// };
    /// let tracker = settings.usage_tracker(usage, history);
    /// assert_eq!(tracker.limit(), UsageLimit::new(5));
    /// # }
    /// ```
    pub fn usage_tracker<U, H>(&self, usage: Arc<U>, history: Arc<H>) -> UsageTracker<U, H> {
        UsageTracker::new(usage, history)
            .with_limit(self.usage_limit())
            .with_history_page_size(self.history_page_size())
    }
}
