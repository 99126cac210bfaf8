//! Database connection pool management
//!
//! A [`Database`] is created from a [`DbConfig`] and passed by reference to
//! everything that runs statements. The underlying sqlx `AnyPool` is built
//! once, on the first [`Database::init`]; statements attempted before that
//! fail with [`OrmError::PoolNotInitialized`].

use std::sync::Arc;

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool, Transaction};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::DbConfig;
use crate::dialect::Dialect;
use crate::error::{OrmError, Result};

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    config: DbConfig,
    url: String,
    dialect: Dialect,
    pool: OnceCell<AnyPool>,
}

impl Database {
    /// Validate the configuration. No connection is opened yet.
    pub fn new(config: DbConfig) -> Result<Self> {
        let url = config.connect_url()?;
        let dialect = config.dialect()?;
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                config,
                url,
                dialect,
                pool: OnceCell::new(),
            }),
        })
    }

    /// Create the handle and initialize the pool in one step.
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let db = Self::new(config)?;
        db.init().await?;
        Ok(db)
    }

    /// Establish the pool. Later calls return the pool built by the first.
    pub async fn init(&self) -> Result<&AnyPool> {
        self.inner
            .pool
            .get_or_try_init(|| async {
                let config = &self.inner.config;
                info!(
                    "create database connection pool ({:?}, min {}, max {})",
                    self.inner.dialect, config.min_size, config.max_size
                );
                install_default_drivers();
                let pool = AnyPoolOptions::new()
                    .max_connections(config.max_size)
                    .min_connections(config.min_size)
                    .connect(&self.inner.url)
                    .await?;
                Ok::<_, OrmError>(pool)
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.pool.initialized()
    }

    pub fn pool(&self) -> Result<&AnyPool> {
        self.inner.pool.get().ok_or(OrmError::PoolNotInitialized)
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn autocommit(&self) -> bool {
        self.inner.config.autocommit
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// Borrow a connection. It returns to the pool when dropped, on every
    /// exit path of the caller's scope. Waits while the pool is saturated.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>> {
        Ok(self.pool()?.acquire().await?)
    }

    /// Borrow a connection with an open transaction. Dropping it without
    /// committing rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>> {
        Ok(self.pool()?.begin().await?)
    }

    /// Live connections currently held by the pool (idle or in use).
    pub fn size(&self) -> u32 {
        self.inner.pool.get().map(AnyPool::size).unwrap_or(0)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.inner.dialect)
            .field("initialized", &self.is_initialized())
            .field("max_size", &self.inner.config.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn statements_before_init_fail() {
        let db = Database::new(DbConfig::from_url("sqlite::memory:")).unwrap();
        assert!(!db.is_initialized());
        assert!(matches!(db.pool(), Err(OrmError::PoolNotInitialized)));
        assert!(matches!(
            db.acquire().await,
            Err(OrmError::PoolNotInitialized)
        ));
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let db = Database::new(DbConfig::from_url("sqlite::memory:").with_pool_size(1, 2)).unwrap();
        let first = db.init().await.unwrap() as *const AnyPool;
        let second = db.init().await.unwrap() as *const AnyPool;
        assert_eq!(first, second);
        assert!(db.is_initialized());
    }

    #[test]
    fn unsupported_scheme_fails_fast() {
        let err = Database::new(DbConfig::from_url("redis://localhost")).unwrap_err();
        assert!(matches!(err, OrmError::Config { .. }));
    }

    // Run with: AWESOME_DB_USER=... AWESOME_DB_PASSWORD=... AWESOME_DB_NAME=... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "requires database"]
    async fn connects_to_mysql() {
        let config = DbConfig::from_env().expect("env config");
        let db = Database::connect(config).await.expect("pool creation failed");
        let rows = db.query("select 1 as one", &[], None).await.expect("query failed");
        assert_eq!(rows.len(), 1);
    }
}
