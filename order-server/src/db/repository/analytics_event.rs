//! Analytics Event Repository (append-only)

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::{AnalyticsEvent, PageView};

#[derive(Clone)]
pub struct AnalyticsEventRepository {
    pool: SqlitePool,
}

impl AnalyticsEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, event: &AnalyticsEvent) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO analytics_events (id, user_id, name, properties, user_agent, ip, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.user_id)
        .bind(&event.name)
        .bind(&event.properties)
        .bind(&event.user_agent)
        .bind(&event.ip)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_page_view(&self, view: &PageView) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO page_views (id, path, user_agent, ip, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&view.id)
        .bind(&view.path)
        .bind(&view.user_agent)
        .bind(&view.ip)
        .bind(view.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Event count and distinct identified users inside `[start, end)`.
    ///
    /// `COUNT(DISTINCT user_id)` skips NULLs, so anonymous events never
    /// inflate the active-user count.
    pub async fn stats_between(&self, start: i64, end: i64) -> RepoResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT user_id) FROM analytics_events
             WHERE created_at >= ? AND created_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
