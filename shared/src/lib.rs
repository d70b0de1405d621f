//! Shared types for the order pipeline
//!
//! Common types used by the server and any in-process test clients:
//! the error-code taxonomy, the callable request/response envelope,
//! and small time/id utilities.

pub mod error;
pub mod request;
pub mod response;
pub mod util;

// Re-exports
pub use error::ErrorCode;
pub use response::{ApiError, ApiResponse};
pub use serde::{Deserialize, Serialize};
