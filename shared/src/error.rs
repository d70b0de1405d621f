//! Unified error codes for the order pipeline
//!
//! Every error surfaced to a caller carries one of these stable,
//! machine-readable reason codes so client UI can branch on it.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error taxonomy
///
/// Serialized as the kebab-case reason string, e.g. `"permission-denied"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// No caller identity
    Unauthenticated,
    /// Caller lacks rights over the resource
    PermissionDenied,
    /// Malformed or missing required field
    InvalidArgument,
    /// Referenced entity absent
    NotFound,
    /// Unexpected failure in a dependency call
    Internal,
}

impl ErrorCode {
    /// Stable reason string (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::NotFound => "not-found",
            ErrorCode::Internal => "internal",
        }
    }

    /// HTTP-equivalent status code
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthenticated => "Authentication required",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::InvalidArgument => "Invalid argument",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(ErrorCode::PermissionDenied.as_str(), "permission-denied");
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidArgument).unwrap(),
            "\"invalid-argument\""
        );
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::Unauthenticated.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Internal.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
