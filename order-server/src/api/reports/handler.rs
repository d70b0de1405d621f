//! Report API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use shared::ApiResponse;
use shared::request::RunReportRequest;

use crate::analytics::Aggregator;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{DailyReport, MonthlyAggregate};
use crate::db::repository::ReportRepository;
use crate::utils::time::parse_date;
use crate::utils::{AppError, AppResult, ok};

fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::permission_denied("reports require admin role"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    30
}

/// Recompute the report for a given date
pub async fn run(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<RunReportRequest>,
) -> AppResult<Json<ApiResponse<DailyReport>>> {
    require_admin(&user)?;
    let date = parse_date(&payload.date)?;
    let aggregator = Aggregator::new(state.pool.clone(), state.config.timezone);
    let report = aggregator.run_for_date(date).await?;
    Ok(ok(report))
}

/// List daily reports, newest first
pub async fn list_daily(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<DailyReport>>>> {
    require_admin(&user)?;
    let reports = ReportRepository::new(state.pool.clone())
        .list_daily(query.limit, query.offset)
        .await?;
    Ok(ok(reports))
}

/// One day's report
pub async fn get_daily(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(date): Path<String>,
) -> AppResult<Json<ApiResponse<DailyReport>>> {
    require_admin(&user)?;
    // Validate the format before hitting the table
    parse_date(&date)?;
    let report = ReportRepository::new(state.pool.clone())
        .find_daily(&date)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no report for {date}")))?;
    Ok(ok(report))
}

/// One month's rollup (YYYY-MM)
pub async fn get_monthly(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(month): Path<String>,
) -> AppResult<Json<ApiResponse<MonthlyAggregate>>> {
    require_admin(&user)?;
    let aggregate = ReportRepository::new(state.pool.clone())
        .find_monthly(&month)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no rollup for {month}")))?;
    Ok(ok(aggregate))
}
