//! User Repository

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::User;

/// Create payload for a user (first authentication)
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, data: UserCreate) -> RepoResult<User> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, role, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&data.id)
        .bind(&data.email)
        .bind(&data.display_name)
        .bind(&data.role)
        .bind(shared::util::now_millis())
        .execute(&self.pool)
        .await?;

        self.find_by_id(&data.id)
            .await?
            .ok_or_else(|| super::RepoError::Database("user vanished after insert".into()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Atomic increment of the completed-order counter
    pub async fn increment_completed(&self, id: &str) -> RepoResult<()> {
        sqlx::query("UPDATE users SET completed_order_count = completed_order_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_subscription_status(&self, id: &str, status: &str) -> RepoResult<()> {
        sqlx::query("UPDATE users SET subscription_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Users created inside `[start, end)` — the new-user count for a window
    pub async fn count_created_between(&self, start: i64, end: i64) -> RepoResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE created_at >= ? AND created_at < ?")
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
