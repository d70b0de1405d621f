//! Daily aggregation and monthly rollup
//!
//! One run reduces a calendar day (in the business time zone) over
//! orders, events and users into a `daily_reports` row, then folds that
//! day into `monthly_analytics`. Both steps are idempotent: the daily
//! row is an upsert keyed by date, and the fold claims the day in
//! `monthly_folded_days` before adding anything.

use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tracing::info;

use shared::util::now_millis;

use crate::db::models::DailyReport;
use crate::db::repository::{
    AnalyticsEventRepository, OrderRepository, ReportRepository, UserRepository,
};
use crate::utils::time::{day_end_millis, day_start_millis, month_key, previous_day};
use crate::utils::AppResult;

/// Analytics aggregation service
#[derive(Clone)]
pub struct Aggregator {
    events: AnalyticsEventRepository,
    orders: OrderRepository,
    users: UserRepository,
    reports: ReportRepository,
    tz: Tz,
}

impl Aggregator {
    pub fn new(pool: SqlitePool, tz: Tz) -> Self {
        Self {
            events: AnalyticsEventRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            reports: ReportRepository::new(pool),
            tz,
        }
    }

    /// Aggregate one calendar day and fold it into its month.
    ///
    /// Safe to re-run: the daily report is overwritten in place and the
    /// monthly fold is skipped for a day that was already folded.
    pub async fn run_for_date(&self, date: NaiveDate) -> AppResult<DailyReport> {
        let start = day_start_millis(date, self.tz);
        let end = day_end_millis(date, self.tz);

        let (event_count, active_users) = self.events.stats_between(start, end).await?;
        let order_count = self.orders.count_created_between(start, end).await?;
        let (completed_orders, revenue) =
            self.orders.completed_stats_between(start, end).await?;
        let new_users = self.users.count_created_between(start, end).await?;

        let average_order_value = if completed_orders > 0 {
            revenue / completed_orders as f64
        } else {
            0.0
        };
        let conversion_rate = if active_users > 0 {
            completed_orders as f64 / active_users as f64 * 100.0
        } else {
            0.0
        };

        let report = DailyReport {
            report_date: date.format("%Y-%m-%d").to_string(),
            order_count,
            completed_orders,
            revenue,
            event_count,
            active_users,
            new_users,
            average_order_value,
            conversion_rate,
            generated_at: now_millis(),
        };

        self.reports.upsert_daily(&report).await?;

        let month = month_key(date);
        let folded = self.reports.fold_monthly(&report, &month).await?;

        info!(
            date = %report.report_date,
            orders = order_count,
            revenue = revenue,
            folded = folded,
            "daily report generated"
        );

        Ok(report)
    }

    /// Scheduled entry point: aggregate yesterday
    pub async fn run_for_previous_day(&self) -> AppResult<DailyReport> {
        self.run_for_date(previous_day(self.tz)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::DbService;
    use crate::db::models::AnalyticsEvent;
    use crate::db::repository::user::UserCreate;
    use crate::db::repository::ProductRepository;
    use crate::lifecycle::LifecycleService;
    use crate::notify::testing::RecordingNotifier;
    use shared::request::{OrderLineInput, StatusTarget};
    use shared::util::new_id;

    const TZ: Tz = chrono_tz::UTC;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    async fn setup() -> (Aggregator, SqlitePool) {
        let db = DbService::in_memory().await.unwrap();
        (Aggregator::new(db.pool.clone(), TZ), db.pool)
    }

    async fn seed_event(pool: &SqlitePool, user_id: Option<&str>, at: i64) {
        AnalyticsEventRepository::new(pool.clone())
            .insert(&AnalyticsEvent {
                id: new_id(),
                user_id: user_id.map(|s| s.to_string()),
                name: "page_interaction".into(),
                properties: "{}".into(),
                user_agent: None,
                ip: None,
                created_at: at,
            })
            .await
            .unwrap();
    }

    /// A completed order created at `at`, for 21.60 of revenue
    async fn seed_completed_order(pool: &SqlitePool, user_id: &str, at: i64) {
        let lifecycle =
            LifecycleService::new(pool.clone(), Arc::new(RecordingNotifier::default()));
        let order = lifecycle
            .create_order(
                user_id,
                &[OrderLineInput {
                    product_id: "p1".into(),
                    quantity: 2,
                }],
            )
            .await
            .unwrap();
        lifecycle
            .transition(
                &order.id,
                StatusTarget::Completed,
                &crate::auth::CurrentUser {
                    id: user_id.into(),
                    role: "customer".into(),
                },
            )
            .await
            .unwrap();
        // Pin the creation time into the aggregation window
        sqlx::query("UPDATE orders SET created_at = ? WHERE id = ?")
            .bind(at)
            .bind(&order.id)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_user(pool: &SqlitePool, id: &str, created_at: i64) {
        UserRepository::new(pool.clone())
            .create(UserCreate {
                id: id.into(),
                email: format!("{id}@example.com"),
                display_name: None,
                role: "customer".into(),
            })
            .await
            .unwrap();
        sqlx::query("UPDATE users SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_day_yields_zero_report() {
        let (aggregator, _pool) = setup().await;

        let report = aggregator.run_for_date(date()).await.unwrap();

        assert_eq!(report.order_count, 0);
        assert_eq!(report.revenue, 0.0);
        assert_eq!(report.average_order_value, 0.0);
        assert_eq!(report.conversion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_day_reduction() {
        let (aggregator, pool) = setup().await;
        let in_window = day_start_millis(date(), TZ) + 3600_000;
        let outside = day_start_millis(date(), TZ) - 3600_000;

        seed_user(&pool, "u1", in_window).await;
        seed_user(&pool, "u2", outside).await;
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 100)
            .await
            .unwrap();

        seed_completed_order(&pool, "u1", in_window).await;
        seed_event(&pool, Some("u1"), in_window).await;
        seed_event(&pool, Some("u1"), in_window).await;
        seed_event(&pool, None, in_window).await;
        seed_event(&pool, Some("u2"), outside).await;

        let report = aggregator.run_for_date(date()).await.unwrap();

        assert_eq!(report.order_count, 1);
        assert_eq!(report.completed_orders, 1);
        assert!((report.revenue - 21.6).abs() < 1e-9);
        assert_eq!(report.event_count, 3);
        // Anonymous events do not count as active users
        assert_eq!(report.active_users, 1);
        assert_eq!(report.new_users, 1);
        assert!((report.average_order_value - 21.6).abs() < 1e-9);
        // 1 completed order over 1 active user, as a percentage
        assert!((report.conversion_rate - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_conversion_rate_over_active_users() {
        let (aggregator, pool) = setup().await;
        let in_window = day_start_millis(date(), TZ) + 3600_000;

        seed_user(&pool, "u1", in_window).await;
        seed_user(&pool, "u2", in_window).await;
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 100)
            .await
            .unwrap();

        seed_completed_order(&pool, "u1", in_window).await;
        seed_event(&pool, Some("u1"), in_window).await;
        seed_event(&pool, Some("u2"), in_window).await;

        let report = aggregator.run_for_date(date()).await.unwrap();

        assert_eq!(report.completed_orders, 1);
        assert_eq!(report.active_users, 2);
        assert!((report.conversion_rate - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (aggregator, pool) = setup().await;
        let in_window = day_start_millis(date(), TZ) + 3600_000;

        seed_user(&pool, "u1", in_window).await;
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 100)
            .await
            .unwrap();
        seed_completed_order(&pool, "u1", in_window).await;

        let first = aggregator.run_for_date(date()).await.unwrap();
        let second = aggregator.run_for_date(date()).await.unwrap();

        // Same figures, single daily row
        assert_eq!(first.revenue, second.revenue);
        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_reports")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows.0, 1);

        // Monthly totals were folded exactly once
        let monthly = ReportRepository::new(pool.clone())
            .find_monthly("2025-06")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monthly.order_count, 1);
        assert!((monthly.revenue - 21.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_fold_leaves_day_claimable() {
        let (aggregator, pool) = setup().await;
        let in_window = day_start_millis(date(), TZ) + 3600_000;

        seed_user(&pool, "u1", in_window).await;
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 100)
            .await
            .unwrap();
        seed_completed_order(&pool, "u1", in_window).await;

        // Hide the monthly table so the fold fails after the daily upsert
        sqlx::query("ALTER TABLE monthly_analytics RENAME TO monthly_hidden")
            .execute(&pool)
            .await
            .unwrap();
        assert!(aggregator.run_for_date(date()).await.is_err());
        sqlx::query("ALTER TABLE monthly_hidden RENAME TO monthly_analytics")
            .execute(&pool)
            .await
            .unwrap();

        // The claim rolled back with the failed fold, so the re-run folds the day
        aggregator.run_for_date(date()).await.unwrap();
        let monthly = ReportRepository::new(pool.clone())
            .find_monthly("2025-06")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monthly.order_count, 1);
        assert!((monthly.revenue - 21.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_two_days_accumulate_in_month() {
        let (aggregator, pool) = setup().await;
        let day1 = date();
        let day2 = date().succ_opt().unwrap();

        seed_user(&pool, "u1", day_start_millis(day1, TZ) + 1000).await;
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 100)
            .await
            .unwrap();
        seed_completed_order(&pool, "u1", day_start_millis(day1, TZ) + 2000).await;
        seed_completed_order(&pool, "u1", day_start_millis(day2, TZ) + 2000).await;

        aggregator.run_for_date(day1).await.unwrap();
        aggregator.run_for_date(day2).await.unwrap();

        let monthly = ReportRepository::new(pool.clone())
            .find_monthly("2025-06")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monthly.order_count, 2);
        assert_eq!(monthly.completed_orders, 2);
        assert!((monthly.revenue - 43.2).abs() < 1e-9);
        assert_eq!(monthly.new_users, 1);
    }
}
