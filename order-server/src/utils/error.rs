//! Unified error handling
//!
//! [`AppError`] is the application-level error every handler returns. It maps
//! onto the stable reason codes in [`shared::error::ErrorCode`], so callers
//! always see `{ success: false, error: { code, message } }` with an
//! HTTP-equivalent status.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shared::{ApiResponse, ErrorCode};
use tracing::error;

use crate::db::repository::RepoError;

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Authentication (401) ==========
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    // ========== Authorization (403) ==========
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ========== Caller errors (4xx) ==========
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ========== System (500) ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable reason code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthenticated | AppError::TokenExpired | AppError::InvalidToken => {
                ErrorCode::Unauthenticated
            }
            AppError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            AppError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = match &self {
            // Internal details are logged, not exposed
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                code.message().to_string()
            }
            other => other.to_string(),
        };

        let body: ApiResponse<()> = ApiResponse::error(code, message);
        (code.http_status(), Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Validation(msg) => AppError::InvalidArgument(msg),
            RepoError::Database(msg) => AppError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;

/// Create a successful response envelope
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}
