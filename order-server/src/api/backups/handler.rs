//! Backup API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use shared::ApiResponse;

use crate::auth::CurrentUser;
use crate::backup::BackupService;
use crate::core::ServerState;
use crate::db::models::BackupManifest;
use crate::db::repository::BackupLogRepository;
use crate::utils::{AppError, AppResult, ok};

fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::permission_denied("backups require admin role"))
    }
}

fn service(state: &ServerState) -> BackupService {
    BackupService::new(
        state.pool.clone(),
        state.config.backup_dir(),
        state.config.backup_collections.clone(),
        state.config.retention.clone(),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Serialize)]
pub struct SweepOutcome {
    pub analytics_events: u64,
    pub page_views: u64,
    pub webhook_events: u64,
}

/// Trigger a full backup run
pub async fn run(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<BackupManifest>>> {
    require_admin(&user)?;
    let manifest = service(&state).run_full_backup().await?;
    Ok(ok(manifest))
}

/// List backup manifests, newest first
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<BackupManifest>>>> {
    require_admin(&user)?;
    let manifests = BackupLogRepository::new(state.pool.clone())
        .find_all(query.limit, query.offset)
        .await?;
    Ok(ok(manifests))
}

/// Run the retention sweep now
pub async fn retention(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<SweepOutcome>>> {
    require_admin(&user)?;
    let outcome = service(&state).run_retention_sweep().await?;
    Ok(ok(SweepOutcome {
        analytics_events: outcome.analytics_events,
        page_views: outcome.page_views,
        webhook_events: outcome.webhook_events,
    }))
}
