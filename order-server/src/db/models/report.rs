//! Derived rollup documents

use serde::{Deserialize, Serialize};

/// Per-day summary, keyed by ISO date string
///
/// Recomputing a day from the same underlying rows is deterministic; the
/// aggregator overwrites rather than appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyReport {
    pub report_date: String,
    pub order_count: i64,
    pub completed_orders: i64,
    pub revenue: f64,
    pub event_count: i64,
    pub active_users: i64,
    pub new_users: i64,
    pub average_order_value: f64,
    pub conversion_rate: f64,
    pub generated_at: i64,
}

/// Per-month rollup, keyed by YYYY-MM
///
/// Built by folding daily totals in; the folded-days set guarantees each day
/// contributes exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyAggregate {
    pub month: String,
    pub order_count: i64,
    pub completed_orders: i64,
    pub revenue: f64,
    pub event_count: i64,
    pub new_users: i64,
    pub updated_at: i64,
}
