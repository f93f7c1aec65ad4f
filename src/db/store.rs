use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::AppError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Handle to the local database file. Cloning is cheap; all clones share one pool.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens the database named by the config, creating the file on first run, and brings the
    /// schema up to date.
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let store = Self::connect(&config.database_url, config.max_connections).await?;
        store.initialize().await?;
        Ok(store)
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("connected to {}", database_url);
        Ok(Self { pool })
    }

    /// A private in-memory database. The pool is pinned to a single connection that never
    /// expires, since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Applies any pending migrations. Safe to call on every start.
    pub async fn initialize(&self) -> Result<(), AppError> {
        MIGRATOR.run(&self.pool).await?;
        debug!("schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, AppError> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
