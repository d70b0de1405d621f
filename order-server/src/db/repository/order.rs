//! Order Repository
//!
//! Status changes are guarded UPDATEs (`WHERE status IN (...)`) so that a
//! transition is accepted at most once, no matter how many callers race.

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::{Order, OrderItem, OrderStatus};

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// List orders, newest first (paginated)
    pub async fn find_all(&self, limit: i64, offset: i64) -> RepoResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// A user's own orders, newest first (paginated)
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn items(&self, order_id: &str) -> RepoResult<Vec<OrderItem>> {
        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ?")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    /// `→ confirmed`, accepted from `processing` or `payment_failed`
    pub async fn confirm(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'confirmed', failure_reason = NULL
             WHERE id = ? AND status IN ('processing', 'payment_failed')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `→ completed`, accepted from `processing` or `confirmed`
    pub async fn complete(&self, id: &str, now: i64) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'completed', completed_at = ?
             WHERE id = ? AND status IN ('processing', 'confirmed')",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `→ cancelled`, accepted from any non-terminal state
    pub async fn cancel(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled'
             WHERE id = ? AND status IN ('pending', 'processing', 'confirmed', 'payment_failed')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `→ payment_failed`, accepted from `processing` or `confirmed`
    pub async fn fail_payment(&self, id: &str, reason: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'payment_failed', failure_reason = ?
             WHERE id = ? AND status IN ('processing', 'confirmed')",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record why validation rejected the order; status stays `pending`
    pub async fn mark_validation_failure(&self, id: &str, reason: &str) -> RepoResult<()> {
        sqlx::query("UPDATE orders SET failure_reason = ? WHERE id = ? AND status = 'pending'")
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Orders created inside `[start, end)`
    pub async fn count_created_between(&self, start: i64, end: i64) -> RepoResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE created_at >= ? AND created_at < ?")
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// Completed-or-paid orders inside `[start, end)`: (count, revenue sum).
    ///
    /// `confirmed` is the post-payment state, so it counts as paid.
    pub async fn completed_stats_between(&self, start: i64, end: i64) -> RepoResult<(i64, f64)> {
        let row: (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(total) FROM orders
             WHERE created_at >= ? AND created_at < ?
             AND status IN ('confirmed', 'completed')",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0, row.1.unwrap_or(0.0)))
    }

    /// Current status, for diagnostics in rejection messages
    pub async fn current_status(&self, id: &str) -> RepoResult<Option<OrderStatus>> {
        let row: Option<(OrderStatus,)> =
            sqlx::query_as("SELECT status FROM orders WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }
}
