//! Backup manifest models

use serde::{Deserialize, Serialize};

/// Per-collection outcome inside a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Success,
    Failed,
}

/// One collection's entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub name: String,
    pub status: CollectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Manifest describing one backup run. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BackupManifest {
    pub id: String,
    pub started_at: i64,
    pub finished_at: i64,
    /// `completed` | `completed_with_errors` | `failed`
    pub status: String,
    /// JSON array of [`CollectionResult`]
    pub collections: String,
}

impl BackupManifest {
    /// Decode the per-collection results
    pub fn collection_results(&self) -> Vec<CollectionResult> {
        serde_json::from_str(&self.collections).unwrap_or_default()
    }
}
