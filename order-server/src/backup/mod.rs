//! Backup and retention
//!
//! A full backup exports each configured collection to its own JSON file
//! under a per-run directory. Collections fail independently: one broken
//! export is recorded in the manifest and the rest still run. The
//! retention sweep deletes aged append-only rows in bounded batches.

use std::path::PathBuf;

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use shared::util::{new_id, now_millis};

use crate::core::RetentionConfig;
use crate::db::models::{BackupManifest, CollectionResult, CollectionStatus};
use crate::db::repository::BackupLogRepository;
use crate::utils::{AppError, AppResult};

/// Rows deleted from one table during a retention sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    pub analytics_events: u64,
    pub page_views: u64,
    pub webhook_events: u64,
}

/// Backup and retention service
#[derive(Clone)]
pub struct BackupService {
    pool: SqlitePool,
    backup_dir: PathBuf,
    collections: Vec<String>,
    retention: RetentionConfig,
}

impl BackupService {
    pub fn new(
        pool: SqlitePool,
        backup_dir: impl Into<PathBuf>,
        collections: Vec<String>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            pool,
            backup_dir: backup_dir.into(),
            collections,
            retention,
        }
    }

    /// Export every configured collection and record the manifest.
    ///
    /// Overall status: `completed` when every collection exported,
    /// `completed_with_errors` when some did, `failed` when none did.
    pub async fn run_full_backup(&self) -> AppResult<BackupManifest> {
        let run_id = new_id();
        let started_at = now_millis();
        let run_dir = self.backup_dir.join(&run_id);

        std::fs::create_dir_all(&run_dir)
            .map_err(|e| AppError::internal(format!("Failed to create backup dir: {e}")))?;

        let mut results = Vec::with_capacity(self.collections.len());

        for name in &self.collections {
            match self.export_collection(name, &run_dir).await {
                Ok((count, file)) => {
                    info!(collection = %name, rows = count, "collection exported");
                    results.push(CollectionResult {
                        name: name.clone(),
                        status: CollectionStatus::Success,
                        count: Some(count),
                        file: Some(file),
                        error: None,
                    });
                }
                Err(e) => {
                    error!(collection = %name, error = %e, "collection export failed");
                    results.push(CollectionResult {
                        name: name.clone(),
                        status: CollectionStatus::Failed,
                        count: None,
                        file: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let succeeded = results
            .iter()
            .filter(|r| r.status == CollectionStatus::Success)
            .count();
        let status = if succeeded == results.len() {
            "completed"
        } else if succeeded > 0 {
            "completed_with_errors"
        } else {
            "failed"
        };

        let manifest = BackupManifest {
            id: run_id,
            started_at,
            finished_at: now_millis(),
            status: status.to_string(),
            collections: serde_json::to_string(&results)
                .map_err(|e| AppError::internal(format!("Failed to encode manifest: {e}")))?,
        };

        BackupLogRepository::new(self.pool.clone())
            .insert(&manifest)
            .await?;

        info!(backup_id = %manifest.id, status = status, "backup run recorded");
        Ok(manifest)
    }

    /// Export one collection to `<run_dir>/<name>.json`, returning the
    /// row count and file name.
    async fn export_collection(&self, name: &str, run_dir: &PathBuf) -> AppResult<(i64, String)> {
        let rows = self.dump_collection(name).await?;
        let count = rows.len() as i64;

        let file_name = format!("{name}.json");
        let path = run_dir.join(&file_name);
        let payload = serde_json::to_vec_pretty(&rows)
            .map_err(|e| AppError::internal(format!("Failed to encode {name}: {e}")))?;
        std::fs::write(&path, payload)
            .map_err(|e| AppError::internal(format!("Failed to write {name}: {e}")))?;

        Ok((count, file_name))
    }

    /// Read all rows of a collection as JSON objects
    async fn dump_collection(&self, name: &str) -> AppResult<Vec<Value>> {
        let rows = match name {
            "users" => {
                let users: Vec<crate::db::models::User> =
                    sqlx::query_as("SELECT * FROM users").fetch_all(&self.pool).await?;
                to_values(&users)?
            }
            "products" => {
                let products: Vec<crate::db::models::Product> =
                    sqlx::query_as("SELECT * FROM products").fetch_all(&self.pool).await?;
                to_values(&products)?
            }
            "orders" => {
                let orders: Vec<crate::db::models::Order> =
                    sqlx::query_as("SELECT * FROM orders").fetch_all(&self.pool).await?;
                to_values(&orders)?
            }
            "order_items" => {
                let items: Vec<crate::db::models::OrderItem> =
                    sqlx::query_as("SELECT * FROM order_items").fetch_all(&self.pool).await?;
                to_values(&items)?
            }
            "daily_reports" => {
                let reports: Vec<crate::db::models::DailyReport> =
                    sqlx::query_as("SELECT * FROM daily_reports").fetch_all(&self.pool).await?;
                to_values(&reports)?
            }
            "subscriptions" => {
                let subs: Vec<crate::db::models::Subscription> =
                    sqlx::query_as("SELECT * FROM subscriptions").fetch_all(&self.pool).await?;
                to_values(&subs)?
            }
            "analytics_events" => {
                let events: Vec<crate::db::models::AnalyticsEvent> =
                    sqlx::query_as("SELECT * FROM analytics_events")
                        .fetch_all(&self.pool)
                        .await?;
                to_values(&events)?
            }
            "page_views" => {
                let views: Vec<crate::db::models::PageView> =
                    sqlx::query_as("SELECT * FROM page_views").fetch_all(&self.pool).await?;
                to_values(&views)?
            }
            "backup_logs" => {
                let logs: Vec<crate::db::models::BackupManifest> =
                    sqlx::query_as("SELECT * FROM backup_logs").fetch_all(&self.pool).await?;
                to_values(&logs)?
            }
            other => {
                return Err(AppError::internal(format!(
                    "unknown backup collection: {other}"
                )));
            }
        };
        Ok(rows)
    }

    /// Delete aged rows from the append-only tables.
    ///
    /// Deletes run in batches of `retention.batch_size` until a batch
    /// comes back short, so one sweep never holds a long write lock.
    pub async fn run_retention_sweep(&self) -> AppResult<RetentionOutcome> {
        let now = now_millis();
        let day_millis = 24 * 3600 * 1000;

        let outcome = RetentionOutcome {
            analytics_events: self
                .delete_aged(
                    "analytics_events",
                    now - self.retention.analytics_event_days * day_millis,
                )
                .await?,
            page_views: self
                .delete_aged("page_views", now - self.retention.page_view_days * day_millis)
                .await?,
            webhook_events: self
                .delete_aged_webhooks(now - self.retention.webhook_event_days * day_millis)
                .await?,
        };

        info!(
            analytics_events = outcome.analytics_events,
            page_views = outcome.page_views,
            webhook_events = outcome.webhook_events,
            "retention sweep finished"
        );
        Ok(outcome)
    }

    async fn delete_aged(&self, table: &str, cutoff: i64) -> AppResult<u64> {
        // table is one of our own fixed names, never caller input
        let sql = format!(
            "DELETE FROM {table} WHERE id IN
             (SELECT id FROM {table} WHERE created_at < ? LIMIT ?)"
        );

        let mut total = 0_u64;
        loop {
            let result = sqlx::query(&sql)
                .bind(cutoff)
                .bind(self.retention.batch_size)
                .execute(&self.pool)
                .await?;
            let deleted = result.rows_affected();
            total += deleted;
            if deleted < self.retention.batch_size as u64 {
                break;
            }
        }

        if total > 0 {
            warn!(table = table, deleted = total, "aged rows deleted");
        }
        Ok(total)
    }

    async fn delete_aged_webhooks(&self, cutoff: i64) -> AppResult<u64> {
        let mut total = 0_u64;
        loop {
            let result = sqlx::query(
                "DELETE FROM processed_webhook_events WHERE event_id IN
                 (SELECT event_id FROM processed_webhook_events WHERE processed_at < ? LIMIT ?)",
            )
            .bind(cutoff)
            .bind(self.retention.batch_size)
            .execute(&self.pool)
            .await?;
            let deleted = result.rows_affected();
            total += deleted;
            if deleted < self.retention.batch_size as u64 {
                break;
            }
        }
        Ok(total)
    }
}

fn to_values<T: serde::Serialize>(rows: &[T]) -> AppResult<Vec<Value>> {
    rows.iter()
        .map(|r| {
            serde_json::to_value(r)
                .map_err(|e| AppError::internal(format!("Failed to serialize row: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::models::AnalyticsEvent;
    use crate::db::repository::user::UserCreate;
    use crate::db::repository::{AnalyticsEventRepository, UserRepository};

    async fn setup(collections: Vec<String>) -> (BackupService, SqlitePool, tempfile::TempDir) {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let service = BackupService::new(
            db.pool.clone(),
            dir.path(),
            collections,
            RetentionConfig {
                analytics_event_days: 180,
                page_view_days: 90,
                webhook_event_days: 90,
                batch_size: 2,
            },
        );
        (service, db.pool, dir)
    }

    async fn seed_user(pool: &SqlitePool) {
        UserRepository::new(pool.clone())
            .create(UserCreate {
                id: "u1".into(),
                email: "u1@example.com".into(),
                display_name: None,
                role: "customer".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_backup_writes_files_and_manifest() {
        let (service, pool, dir) = setup(vec!["users".into(), "orders".into()]).await;
        seed_user(&pool).await;

        let manifest = service.run_full_backup().await.unwrap();

        assert_eq!(manifest.status, "completed");
        let results = manifest.collection_results();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == CollectionStatus::Success));

        let users_file = dir.path().join(&manifest.id).join("users.json");
        let content = std::fs::read_to_string(users_file).unwrap();
        let rows: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "u1");

        // Manifest is on record
        let logged = BackupLogRepository::new(pool.clone())
            .find_all(10, 0)
            .await
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, manifest.id);
    }

    #[tokio::test]
    async fn test_append_only_collections_are_exportable() {
        let (service, pool, dir) = setup(vec![
            "analytics_events".into(),
            "page_views".into(),
            "backup_logs".into(),
        ])
        .await;

        AnalyticsEventRepository::new(pool.clone())
            .insert(&AnalyticsEvent {
                id: "e1".into(),
                user_id: None,
                name: "click".into(),
                properties: "{}".into(),
                user_agent: None,
                ip: None,
                created_at: now_millis(),
            })
            .await
            .unwrap();
        AnalyticsEventRepository::new(pool.clone())
            .insert_page_view(&crate::db::models::PageView {
                id: "v1".into(),
                path: "/menu".into(),
                user_agent: None,
                ip: None,
                created_at: now_millis(),
            })
            .await
            .unwrap();

        let manifest = service.run_full_backup().await.unwrap();
        assert_eq!(manifest.status, "completed");

        let events_file = dir.path().join(&manifest.id).join("analytics_events.json");
        let rows: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(events_file).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "e1");

        let views_file = dir.path().join(&manifest.id).join("page_views.json");
        let rows: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(views_file).unwrap()).unwrap();
        assert_eq!(rows[0]["path"], "/menu");
    }

    #[tokio::test]
    async fn test_collection_failures_are_independent() {
        let (service, pool, _dir) = setup(vec!["users".into(), "bogus".into()]).await;
        seed_user(&pool).await;

        let manifest = service.run_full_backup().await.unwrap();

        // One failure does not abort the run
        assert_eq!(manifest.status, "completed_with_errors");
        let results = manifest.collection_results();
        let bogus = results.iter().find(|r| r.name == "bogus").unwrap();
        assert_eq!(bogus.status, CollectionStatus::Failed);
        assert!(bogus.error.as_ref().unwrap().contains("unknown backup collection"));

        let users = results.iter().find(|r| r.name == "users").unwrap();
        assert_eq!(users.status, CollectionStatus::Success);
        assert_eq!(users.count, Some(1));
    }

    #[tokio::test]
    async fn test_all_failures_mark_run_failed() {
        let (service, _pool, _dir) = setup(vec!["bogus".into()]).await;

        let manifest = service.run_full_backup().await.unwrap();
        assert_eq!(manifest.status, "failed");
    }

    #[tokio::test]
    async fn test_retention_deletes_only_aged_rows() {
        let (service, pool, _dir) = setup(vec![]).await;
        let now = now_millis();
        let old = now - 200 * 24 * 3600 * 1000;
        let events = AnalyticsEventRepository::new(pool.clone());

        // 5 aged events exercise the batch loop (batch_size = 2)
        for i in 0..5 {
            events
                .insert(&AnalyticsEvent {
                    id: format!("old-{i}"),
                    user_id: None,
                    name: "click".into(),
                    properties: "{}".into(),
                    user_agent: None,
                    ip: None,
                    created_at: old,
                })
                .await
                .unwrap();
        }
        events
            .insert(&AnalyticsEvent {
                id: "fresh".into(),
                user_id: None,
                name: "click".into(),
                properties: "{}".into(),
                user_agent: None,
                ip: None,
                created_at: now,
            })
            .await
            .unwrap();

        let outcome = service.run_retention_sweep().await.unwrap();

        assert_eq!(outcome.analytics_events, 5);
        let remaining: (i64, String) =
            sqlx::query_as("SELECT COUNT(*), MAX(id) FROM analytics_events")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(remaining.0, 1);
        assert_eq!(remaining.1, "fresh");
    }
}
