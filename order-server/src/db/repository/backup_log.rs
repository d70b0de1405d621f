//! Backup Log Repository — manifests of backup runs

use sqlx::SqlitePool;

use super::RepoResult;
use crate::db::models::BackupManifest;

#[derive(Clone)]
pub struct BackupLogRepository {
    pool: SqlitePool,
}

impl BackupLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, manifest: &BackupManifest) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO backup_logs (id, started_at, finished_at, status, collections)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&manifest.id)
        .bind(manifest.started_at)
        .bind(manifest.finished_at)
        .bind(&manifest.status)
        .bind(&manifest.collections)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_all(&self, limit: i64, offset: i64) -> RepoResult<Vec<BackupManifest>> {
        let manifests = sqlx::query_as::<_, BackupManifest>(
            "SELECT * FROM backup_logs ORDER BY started_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(manifests)
    }
}
