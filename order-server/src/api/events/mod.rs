//! Analytics event API Module
//!
//! Tracked events require a token; page views are anonymous.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Event router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/events", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::track))
        .route("/page-view", post(handler::page_view))
}
