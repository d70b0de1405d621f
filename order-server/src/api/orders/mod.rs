//! Order API Module
//!
//! Creation, listing and lifecycle transitions. All routes require a
//! valid token; ownership checks live in the lifecycle service.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", post(handler::update_status))
        .route("/{id}/items", get(handler::items))
}
