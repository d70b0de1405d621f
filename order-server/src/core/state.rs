use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::notify::{LogNotifier, Notifier};
use crate::utils::{AppError, AppResult};

/// Server state - shared handles for every request handler and job
///
/// Cloning is cheap: the pool and services are behind `Arc`.
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | immutable configuration |
/// | pool | SQLite connection pool |
/// | jwt_service | token validation |
/// | notifier | best-effort notification channel |
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Config,
    /// Database connection pool
    pub pool: SqlitePool,
    /// JWT service (shared ownership)
    pub jwt_service: Arc<JwtService>,
    /// Notification channel; failures here never fail a request
    pub notifier: Arc<dyn Notifier>,
}

impl ServerState {
    /// Initialize server state.
    ///
    /// Ensures the work directory layout exists, opens the database and
    /// runs migrations, then wires up the services.
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let work_dir = PathBuf::from(&config.work_dir);
        for sub in ["database", "logs", "backups"] {
            std::fs::create_dir_all(work_dir.join(sub))
                .map_err(|e| AppError::internal(format!("Failed to create work dir: {e}")))?;
        }

        let db_service = DbService::new(&config.database_path())
            .await
            .map_err(|e| AppError::internal(format!("Failed to initialize database: {e}")))?;

        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

        Ok(Self {
            config: config.clone(),
            pool: db_service.pool,
            jwt_service,
            notifier,
        })
    }

    /// State backed by an in-memory database, for tests
    #[cfg(test)]
    pub async fn for_tests(pool: SqlitePool) -> Self {
        use crate::auth::JwtConfig;

        let config = Config {
            work_dir: "/tmp/order-server-test".into(),
            http_port: 0,
            environment: "test".into(),
            timezone: chrono_tz::Europe::Madrid,
            webhook_secret: "whsec_test_secret".into(),
            jwt: JwtConfig {
                secret: "test-secret-key-that-is-long-enough!".into(),
                expiration_minutes: 60,
                issuer: "order-server".into(),
                audience: "order-clients".into(),
            },
            aggregation_hour: 2,
            backup_hour: 3,
            retention_weekday: chrono::Weekday::Sun,
            retention_hour: 4,
            retention: crate::core::RetentionConfig::default(),
            backup_collections: vec!["users".into(), "orders".into()],
        };

        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

        Self {
            config,
            pool,
            jwt_service,
            notifier,
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }
}
