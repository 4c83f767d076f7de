//! `bb8` pool of `diesel-async` PostgreSQL connections.
//!
//! Every repository shares one [`DbPool`]. Caller scoping is applied per
//! transaction (see `caller_scope`), so pooled connections never carry a
//! role or identity between checkouts.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use tracing::debug;

/// Pool construction and checkout failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No connection became available in time, or the server refused one.
    #[error("database connection checkout failed: {message}")]
    Checkout { message: String },

    /// The pool could not be set up: a malformed URL, or `min_idle`
    /// connections that could not be opened.
    #[error("database pool could not be created: {message}")]
    Build { message: String },
}

/// Where to connect and how many connections to hold.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use woo_sync_store::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("postgres://store@localhost/woo")
///     .with_max_size(4)
///     .with_min_idle(None)
///     .with_connection_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_size(), 4);
/// assert_eq!(config.min_idle(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout: Duration,
}

impl PoolConfig {
    /// Ten connections, two warm, thirty-second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            min_idle: Some(2),
            connection_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Connections opened eagerly and kept warm. `None` opens lazily.
    pub fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// How long [`DbPool::get`] waits before giving up.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn min_idle(&self) -> Option<u32> {
        self.min_idle
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}

/// Shared async connection pool. Cloning shares the same connections.
#[derive(Clone)]
pub struct DbPool {
    connections: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool, opening `min_idle` connections up front.
    ///
    /// # Errors
    ///
    /// [`PoolError::Build`] when the URL is invalid or the server is
    /// unreachable.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let PoolConfig {
            database_url,
            max_size,
            min_idle,
            connection_timeout,
        } = config;
        debug!(max_size, ?min_idle, ?connection_timeout, "building store pool");

        let connections = Pool::builder()
            .max_size(max_size)
            .min_idle(min_idle)
            .connection_timeout(connection_timeout)
            .build(AsyncDieselConnectionManager::new(database_url))
            .await
            .map_err(|error| PoolError::Build {
                message: error.to_string(),
            })?;
        Ok(Self { connections })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// [`PoolError::Checkout`] when none is available within the timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.connections
            .get()
            .await
            .map_err(|error| PoolError::Checkout {
                message: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn new_uses_the_documented_sizing() {
        let config = PoolConfig::new("postgres://localhost/woo");

        assert_eq!(config.database_url(), "postgres://localhost/woo");
        assert_eq!(config.max_size(), 10);
        assert_eq!(config.min_idle(), Some(2));
        assert_eq!(config.connection_timeout(), Duration::from_secs(30));
    }

    #[rstest]
    fn builder_overrides_only_what_it_is_given() {
        let config = PoolConfig::new("postgres://localhost/woo")
            .with_max_size(3)
            .with_connection_timeout(Duration::from_secs(2));

        assert_eq!(config.max_size(), 3);
        assert_eq!(config.min_idle(), Some(2));
        assert_eq!(config.connection_timeout(), Duration::from_secs(2));
        assert_eq!(
            config.with_min_idle(None),
            PoolConfig::new("postgres://localhost/woo")
                .with_max_size(3)
                .with_min_idle(None)
                .with_connection_timeout(Duration::from_secs(2))
        );
    }

    #[rstest]
    #[case(PoolError::Checkout { message: "timed out".into() }, "checkout failed: timed out")]
    #[case(PoolError::Build { message: "bad url".into() }, "created: bad url")]
    fn errors_carry_the_driver_message(#[case] error: PoolError, #[case] suffix: &str) {
        assert!(error.to_string().ends_with(suffix), "{error}");
    }
}
