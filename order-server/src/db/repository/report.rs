//! Report Repository — daily upserts and the monthly fold

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::{DailyReport, MonthlyAggregate};

#[derive(Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed by ISO date — re-running a day overwrites,
    /// never duplicates.
    pub async fn upsert_daily(&self, report: &DailyReport) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO daily_reports (report_date, order_count, completed_orders, revenue,
                 event_count, active_users, new_users, average_order_value, conversion_rate,
                 generated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(report_date) DO UPDATE SET
                 order_count = excluded.order_count,
                 completed_orders = excluded.completed_orders,
                 revenue = excluded.revenue,
                 event_count = excluded.event_count,
                 active_users = excluded.active_users,
                 new_users = excluded.new_users,
                 average_order_value = excluded.average_order_value,
                 conversion_rate = excluded.conversion_rate,
                 generated_at = excluded.generated_at",
        )
        .bind(&report.report_date)
        .bind(report.order_count)
        .bind(report.completed_orders)
        .bind(report.revenue)
        .bind(report.event_count)
        .bind(report.active_users)
        .bind(report.new_users)
        .bind(report.average_order_value)
        .bind(report.conversion_rate)
        .bind(report.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_daily(&self, date: &str) -> RepoResult<Option<DailyReport>> {
        let report =
            sqlx::query_as::<_, DailyReport>("SELECT * FROM daily_reports WHERE report_date = ?")
                .bind(date)
                .fetch_optional(&self.pool)
                .await?;
        Ok(report)
    }

    pub async fn list_daily(&self, limit: i64, offset: i64) -> RepoResult<Vec<DailyReport>> {
        let reports = sqlx::query_as::<_, DailyReport>(
            "SELECT * FROM daily_reports ORDER BY report_date DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    /// Fold a day's totals into its month, exactly once.
    ///
    /// The day is first claimed in `monthly_folded_days`; if the claim was
    /// already present (a re-run) the fold is skipped, which is what keeps
    /// the monthly rollup idempotent. Claim and fold share one transaction,
    /// so a failed fold leaves the day unclaimed and a re-run can retry it.
    /// Returns whether the fold happened.
    pub async fn fold_monthly(&self, report: &DailyReport, month: &str) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "INSERT INTO monthly_folded_days (report_date, month) VALUES (?, ?)
             ON CONFLICT(report_date) DO NOTHING",
        )
        .bind(&report.report_date)
        .bind(month)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO monthly_analytics (month, order_count, completed_orders, revenue,
                 event_count, new_users, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(month) DO UPDATE SET
                 order_count = order_count + excluded.order_count,
                 completed_orders = completed_orders + excluded.completed_orders,
                 revenue = revenue + excluded.revenue,
                 event_count = event_count + excluded.event_count,
                 new_users = new_users + excluded.new_users,
                 updated_at = excluded.updated_at",
        )
        .bind(month)
        .bind(report.order_count)
        .bind(report.completed_orders)
        .bind(report.revenue)
        .bind(report.event_count)
        .bind(report.new_users)
        .bind(report.generated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn find_monthly(&self, month: &str) -> RepoResult<Option<MonthlyAggregate>> {
        let aggregate = sqlx::query_as::<_, MonthlyAggregate>(
            "SELECT * FROM monthly_analytics WHERE month = ?",
        )
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(aggregate)
    }
}
