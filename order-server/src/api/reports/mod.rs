//! Report API Module
//!
//! Admin-only: reading daily reports, the monthly rollup, and triggering
//! a recompute for a specific date.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Report router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/reports", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/run", post(handler::run))
        .route("/daily", get(handler::list_daily))
        .route("/daily/{date}", get(handler::get_daily))
        .route("/monthly/{month}", get(handler::get_monthly))
}
