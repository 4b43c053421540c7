//! Database connection pool management
//!
//! Pool configuration and creation for PostgreSQL using sqlx. The pool is
//! the one shared resource of the access layer: every logical operation
//! acquires its own connection from it, so no two operations ever share a
//! session concurrently.

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::StoreError;

/// Type alias for the PostgreSQL connection pool
pub type StorePool = PgPool;

/// Configuration options for the database connection pool
///
/// # Example
///
/// ```rust,ignore
/// use infra_store::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::new("postgres://localhost/rowset")
///     .max_connections(20)
///     .connect_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum lifetime of a connection in seconds
    pub max_lifetime_secs: u64,
    /// Idle timeout before closing a connection, in seconds
    pub idle_timeout_secs: u64,
}

impl StoreConfig {
    /// Creates a configuration with the given connection URL and defaults
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 10 * 60,
        }
    }

    /// Loads configuration from `STORE_`-prefixed environment variables
    ///
    /// `STORE_URL` is required; the remaining settings fall back to the
    /// defaults of [`StoreConfig::new`] when unset.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("max_connections", 10u32)?
            .set_default("min_connections", 2u32)?
            .set_default("connect_timeout_secs", 30u64)?
            .set_default("max_lifetime_secs", 30 * 60u64)?
            .set_default("idle_timeout_secs", 10 * 60u64)?
            .add_source(config::Environment::with_prefix("STORE"))
            .build()?
            .try_deserialize()
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime_secs = lifetime.as_secs();
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_secs = timeout.as_secs();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/rowset")
    }
}

/// Creates a connection pool with the given configuration
///
/// # Errors
///
/// Returns `StoreError::ConnectionFailed` if the pool cannot be created.
pub async fn create_pool(config: StoreConfig) -> Result<StorePool, StoreError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "creating store pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

    info!("store pool created");
    Ok(pool)
}

/// Creates a connection pool from a URL with default settings
pub async fn create_pool_from_url(url: &str) -> Result<StorePool, StoreError> {
    create_pool(StoreConfig::new(url)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = StoreConfig::new("postgres://test")
            .max_connections(50)
            .min_connections(10)
            .connect_timeout(Duration::from_secs(60));

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.connect_timeout_secs, 60);
        assert_eq!(config.url, "postgres://test");
    }
}
