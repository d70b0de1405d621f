//! Repository Module
//!
//! One repository struct per table, each owning a pool handle. Everything
//! here speaks [`RepoError`]; conversion to [`crate::utils::AppError`]
//! happens at the handler/service layer.

pub mod analytics_event;
pub mod backup_log;
pub mod order;
pub mod product;
pub mod report;
pub mod subscription;
pub mod user;

// Re-exports
pub use analytics_event::AnalyticsEventRepository;
pub use backup_log::BackupLogRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use report::ReportRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".into()),
            other => RepoError::Database(other.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
