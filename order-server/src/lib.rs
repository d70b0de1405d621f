//! Order Pipeline Server
//!
//! Backend for a restaurant ordering application: order lifecycle,
//! payment-processor webhooks, analytics rollups, and backup/retention jobs.
//!
//! # Module structure
//!
//! ```text
//! order-server/src/
//! ├── core/          # Config, state, server, background tasks
//! ├── auth/          # JWT authentication
//! ├── db/            # Pool setup, models, repositories
//! ├── lifecycle/     # Order state machine and side effects
//! ├── notify/        # Best-effort notification dispatch
//! ├── payments/      # Webhook signature check and event handling
//! ├── analytics/     # Daily/monthly aggregation
//! ├── backup/        # Full backup and retention sweep
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # Errors, logging, time helpers
//! ```

pub mod analytics;
pub mod api;
pub mod auth;
pub mod backup;
pub mod core;
pub mod db;
pub mod lifecycle;
pub mod notify;
pub mod payments;
pub mod utils;

// Re-export common types
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
