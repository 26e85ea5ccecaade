use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::TrackedSite;
use crate::Result;

pub mod content;
pub mod sqlite;

pub use content::{ContentStore, FsContentStore};
pub use sqlite::SqliteSiteStore;

/// Entity store for tracked sites.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Fails with `AppError::NotFound` when no site has this id.
    async fn get(&self, id: &str) -> Result<TrackedSite>;

    /// Every site whose should-check flag is set.
    async fn scan_eligible(&self) -> Result<Vec<TrackedSite>>;

    /// Unconditional single-key write of the should-check flag.
    async fn set_should_check(&self, id: &str, should_check: bool) -> Result<()>;

    async fn put(&self, site: &TrackedSite) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Makes a site eligible again, optionally with a new expected value.
    async fn rearm(&self, id: &str, expected: Option<&str>) -> Result<TrackedSite>;
}

/// Opens the pool and applies migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // An in-memory database lives and dies with its connection
    let in_memory = config.url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.max_connections };
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
