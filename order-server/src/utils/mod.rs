//! Utility module
//!
//! - [`AppError`] / [`AppResult`] - application error type and alias
//! - [`logger`] - tracing setup
//! - [`time`] - business-time-zone date helpers

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResult, ok};
