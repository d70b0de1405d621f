//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use shared::ApiResponse;
use shared::request::{CreateOrderRequest, UpdateOrderStatusRequest};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderItem};
use crate::db::repository::OrderRepository;
use crate::lifecycle::LifecycleService;
use crate::utils::{AppResult, ok};

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Create an order for the caller
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let lifecycle = LifecycleService::new(state.pool.clone(), state.notifier.clone());
    let order = lifecycle.create_order(&user.id, &payload.items).await?;
    Ok(ok(order))
}

/// List orders: admins see everything, users see their own
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let repo = OrderRepository::new(state.pool.clone());
    let orders = if user.is_admin() {
        repo.find_all(query.limit, query.offset).await?
    } else {
        repo.find_by_user(&user.id, query.limit, query.offset).await?
    };
    Ok(ok(orders))
}

/// Get one order (owner or admin)
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let lifecycle = LifecycleService::new(state.pool.clone(), state.notifier.clone());
    let order = lifecycle.fetch_for(&id, &user).await?;
    Ok(ok(order))
}

/// Request a status transition (owner or admin)
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let lifecycle = LifecycleService::new(state.pool.clone(), state.notifier.clone());
    let order = lifecycle.transition(&id, payload.status, &user).await?;
    Ok(ok(order))
}

/// Line items of one order (owner or admin)
pub async fn items(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<OrderItem>>>> {
    let lifecycle = LifecycleService::new(state.pool.clone(), state.notifier.clone());
    // Permission check rides on the fetch
    lifecycle.fetch_for(&id, &user).await?;

    let repo = OrderRepository::new(state.pool.clone());
    let items = repo.items(&id).await?;
    Ok(ok(items))
}
