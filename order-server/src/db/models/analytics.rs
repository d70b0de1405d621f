//! Analytics event models (append-only)

use serde::{Deserialize, Serialize};

/// Tracked client event
///
/// `properties` is a free-form JSON object stored as text.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalyticsEvent {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub properties: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub created_at: i64,
}

/// Anonymous page view
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageView {
    pub id: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub created_at: i64,
}
