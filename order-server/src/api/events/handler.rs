//! Analytics event API Handlers

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;

use shared::ApiResponse;
use shared::request::{PageViewRequest, TrackEventRequest};
use shared::util::{new_id, now_millis};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{AnalyticsEvent, PageView};
use crate::db::repository::AnalyticsEventRepository;
use crate::utils::{AppError, AppResult, ok};

#[derive(Serialize)]
pub struct Tracked {
    pub id: String,
}

fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string());
    (user_agent, ip)
}

/// Record a named event for the caller
pub async fn track(
    State(state): State<ServerState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(payload): Json<TrackEventRequest>,
) -> AppResult<Json<ApiResponse<Tracked>>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::invalid_argument("event name must not be empty"));
    }

    let (user_agent, ip) = client_meta(&headers);
    let event = AnalyticsEvent {
        id: new_id(),
        user_id: Some(user.id),
        name: payload.name,
        properties: serde_json::to_string(&payload.properties)
            .map_err(|e| AppError::invalid_argument(format!("Invalid properties: {e}")))?,
        user_agent,
        ip,
        created_at: now_millis(),
    };

    AnalyticsEventRepository::new(state.pool.clone())
        .insert(&event)
        .await?;
    Ok(ok(Tracked { id: event.id }))
}

/// Record an anonymous page view
pub async fn page_view(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<PageViewRequest>,
) -> AppResult<Json<ApiResponse<Tracked>>> {
    if payload.path.trim().is_empty() {
        return Err(AppError::invalid_argument("path must not be empty"));
    }

    let (user_agent, ip) = client_meta(&headers);
    let view = PageView {
        id: new_id(),
        path: payload.path,
        user_agent,
        ip,
        created_at: now_millis(),
    };

    AnalyticsEventRepository::new(state.pool.clone())
        .insert_page_view(&view)
        .await?;
    Ok(ok(Tracked { id: view.id }))
}
