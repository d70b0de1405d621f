//! API routing
//!
//! # Structure
//!
//! - [`health`] - health check
//! - [`orders`] - order creation and lifecycle
//! - [`events`] - analytics event tracking
//! - [`reports`] - daily reports and the monthly rollup
//! - [`backups`] - backup runs and retention
//! - payments webhook (raw-body route, see [`crate::payments`])

pub mod backups;
pub mod events;
pub mod health;
pub mod orders;
pub mod reports;

use axum::Router;
use axum::routing::post;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::payments;

/// Assemble the full application router
pub fn build_app() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(events::router())
        .merge(reports::router())
        .merge(backups::router())
        .route("/webhooks/payments", post(payments::handle_webhook))
        .layer(TraceLayer::new_for_http())
}
