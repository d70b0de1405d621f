use chrono::Weekday;
use chrono_tz::Tz;

use crate::auth::JwtConfig;
use crate::utils::{AppError, AppResult};

/// Retention windows for append-only data, in days
///
/// Deletes run in bounded batches so a large backlog never produces a
/// single huge statement.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Analytics events older than this are deleted
    pub analytics_event_days: i64,
    /// Page views older than this are deleted
    pub page_view_days: i64,
    /// Processed webhook event ids older than this are deleted
    pub webhook_event_days: i64,
    /// Rows deleted per batch
    pub batch_size: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            analytics_event_days: 180,
            page_view_days: 90,
            webhook_event_days: 90,
            batch_size: 500,
        }
    }
}

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/order-server | working directory (db, logs, backups) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | BUSINESS_TIMEZONE | Europe/Madrid | timezone for daily windows |
/// | WEBHOOK_SECRET | (required) | payment webhook signing secret |
/// | AGGREGATION_HOUR | 2 | local hour the daily report job runs |
/// | BACKUP_HOUR | 3 | local hour the backup job runs |
/// | RETENTION_HOUR | 4 | local hour the weekly retention sweep runs |
/// | BACKUP_COLLECTIONS | (all tables) | comma-separated collections to back up |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/orders HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for database, logs and backups
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Business timezone; all daily windows are computed in it
    pub timezone: Tz,
    /// Shared secret for verifying payment webhook signatures
    pub webhook_secret: String,
    /// JWT configuration
    pub jwt: JwtConfig,

    // === Background job schedule ===
    /// Local hour at which the daily aggregation runs
    pub aggregation_hour: u32,
    /// Local hour at which the daily backup runs
    pub backup_hour: u32,
    /// Weekday of the retention sweep
    pub retention_weekday: Weekday,
    /// Local hour of the retention sweep
    pub retention_hour: u32,
    /// Retention windows
    pub retention: RetentionConfig,
    /// Collections included in a full backup
    pub backup_collections: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults where unset.
    pub fn from_env() -> AppResult<Self> {
        let timezone: Tz = std::env::var("BUSINESS_TIMEZONE")
            .unwrap_or_else(|_| "Europe/Madrid".into())
            .parse()
            .map_err(|e| AppError::internal(format!("Invalid BUSINESS_TIMEZONE: {e}")))?;

        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let webhook_secret = match std::env::var("WEBHOOK_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment != "production" => {
                tracing::warn!("WEBHOOK_SECRET not set! Using development placeholder.");
                "whsec_development_placeholder".to_string()
            }
            Err(_) => {
                return Err(AppError::internal(
                    "WEBHOOK_SECRET must be set in production",
                ));
            }
        };

        let jwt = JwtConfig::from_env()
            .map_err(|e| AppError::internal(format!("JWT configuration error: {e}")))?;

        let mut retention = RetentionConfig::default();
        if let Some(days) = env_parse("RETENTION_EVENT_DAYS") {
            retention.analytics_event_days = days;
        }
        if let Some(days) = env_parse("RETENTION_PAGE_VIEW_DAYS") {
            retention.page_view_days = days;
        }
        if let Some(days) = env_parse("RETENTION_WEBHOOK_DAYS") {
            retention.webhook_event_days = days;
        }
        if let Some(size) = env_parse("RETENTION_BATCH_SIZE") {
            retention.batch_size = size;
        }

        let backup_collections = match std::env::var("BACKUP_COLLECTIONS") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => default_backup_collections(),
        };

        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/order-server".into()),
            http_port: env_parse("HTTP_PORT").unwrap_or(3000),
            environment,
            timezone,
            webhook_secret,
            jwt,
            aggregation_hour: env_hour("AGGREGATION_HOUR", 2)?,
            backup_hour: env_hour("BACKUP_HOUR", 3)?,
            retention_weekday: Weekday::Sun,
            retention_hour: env_hour("RETENTION_HOUR", 4)?,
            retention,
            backup_collections,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Database file path inside the working directory
    pub fn database_path(&self) -> String {
        format!("{}/database/orders.db", self.work_dir)
    }

    /// Directory backup runs are written to
    pub fn backup_dir(&self) -> String {
        format!("{}/backups", self.work_dir)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_hour(key: &str, default: u32) -> AppResult<u32> {
    check_hour(key, env_parse(key).unwrap_or(default))
}

/// A local hour must stay within 0..=23 or the daily scheduler can never
/// resolve its next run time.
fn check_hour(key: &str, hour: u32) -> AppResult<u32> {
    if hour > 23 {
        return Err(AppError::internal(format!(
            "{key} must be between 0 and 23, got {hour}"
        )));
    }
    Ok(hour)
}

fn default_backup_collections() -> Vec<String> {
    [
        "users",
        "products",
        "orders",
        "order_items",
        "daily_reports",
        "subscriptions",
        "analytics_events",
        "page_views",
        "backup_logs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_hours_stay_within_a_day() {
        assert_eq!(check_hour("BACKUP_HOUR", 0).unwrap(), 0);
        assert_eq!(check_hour("BACKUP_HOUR", 23).unwrap(), 23);
        assert!(check_hour("BACKUP_HOUR", 24).is_err());
    }
}
