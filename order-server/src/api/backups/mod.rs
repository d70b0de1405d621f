//! Backup API Module
//!
//! Admin-only: trigger a backup run, list past manifests, run the
//! retention sweep on demand.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Backup router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/backups", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/run", post(handler::run))
        .route("/retention", post(handler::retention))
}
