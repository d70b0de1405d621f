//! Core module - server configuration, state and lifecycle
//!
//! # Structure
//!
//! - [`Config`] - server configuration
//! - [`ServerState`] - shared application state
//! - [`Server`] - HTTP server
//! - [`BackgroundTasks`] - background job registry

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, RetentionConfig};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
