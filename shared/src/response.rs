//! API response envelope
//!
//! All callable endpoints answer with this structure:
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error": { "code": "not-found", "message": "..." } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Structured error body carried by failed responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable reason code, safe to branch on
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

/// Unified response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}
