use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::SiteStore;
use crate::models::TrackedSite;
use crate::utils::error::AppError;
use crate::Result;

const SITE_COLUMNS: &str = "id, url, selector, regex, expected, email, should_check, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteSiteStore {
    pool: SqlitePool,
}

impl SqliteSiteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteStore for SqliteSiteStore {
    async fn get(&self, id: &str) -> Result<TrackedSite> {
        let sql = format!("SELECT {} FROM sites WHERE id = ?", SITE_COLUMNS);
        sqlx::query_as::<_, TrackedSite>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("site {}", id),
            })
    }

    async fn scan_eligible(&self) -> Result<Vec<TrackedSite>> {
        let sql = format!(
            "SELECT {} FROM sites WHERE should_check = 1 ORDER BY created_at",
            SITE_COLUMNS
        );
        let sites = sqlx::query_as::<_, TrackedSite>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    async fn set_should_check(&self, id: &str, should_check: bool) -> Result<()> {
        let result = sqlx::query("UPDATE sites SET should_check = ?, updated_at = ? WHERE id = ?")
            .bind(should_check)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(site_id = id, "should_check update matched no site");
        }
        Ok(())
    }

    async fn put(&self, site: &TrackedSite) -> Result<()> {
        sqlx::query(
            "INSERT INTO sites (id, url, selector, regex, expected, email, should_check, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                selector = excluded.selector,
                regex = excluded.regex,
                expected = excluded.expected,
                email = excluded.email,
                should_check = excluded.should_check,
                updated_at = excluded.updated_at",
        )
        .bind(&site.id)
        .bind(&site.url)
        .bind(&site.selector)
        .bind(&site.pattern)
        .bind(&site.expected)
        .bind(&site.notify_target)
        .bind(site.eligible)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rearm(&self, id: &str, expected: Option<&str>) -> Result<TrackedSite> {
        let result = sqlx::query(
            "UPDATE sites SET should_check = 1, expected = COALESCE(?, expected), updated_at = ? WHERE id = ?",
        )
        .bind(expected)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("site {}", id),
            });
        }
        self.get(id).await
    }
}
