//! Subscription Repository

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::Subscription;

/// Upsert payload, keyed by the processor's subscription id
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub status: &'a str,
    pub plan: &'a str,
    pub current_period_end: Option<i64>,
    pub now: i64,
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Last-write-wins upsert; repeated delivery of the same event is a no-op
    /// state-wise.
    pub async fn upsert(&self, sub: &SubscriptionUpsert<'_>) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, user_id, status, plan, current_period_end,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 plan = excluded.plan,
                 current_period_end = excluded.current_period_end,
                 updated_at = excluded.updated_at",
        )
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.status)
        .bind(sub.plan)
        .bind(sub.current_period_end)
        .bind(sub.now)
        .bind(sub.now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: &str, now: i64) -> RepoResult<()> {
        sqlx::query("UPDATE subscriptions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_period_end(&self, id: &str, period_end: i64, now: i64) -> RepoResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET current_period_end = ?, updated_at = ? WHERE id = ?",
        )
        .bind(period_end)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sub)
    }

    /// Owning user for a subscription id
    pub async fn find_user_id(&self, id: &str) -> RepoResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM subscriptions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }
}
