//! Server Implementation
//!
//! HTTP server startup, background job scheduling and graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::analytics::Aggregator;
use crate::api;
use crate::backup::BackupService;
use crate::core::tasks::{BackgroundTasks, TaskKind, next_daily_delay, next_weekly_delay};
use crate::core::{Config, ServerState};
use crate::utils::{AppError, AppResult};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (shared with tests or tooling)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> AppResult<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let mut tasks = BackgroundTasks::new();
        spawn_scheduled_jobs(&mut tasks, &state);

        let app = api::build_app().with_state(state.clone());

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        info!("Order server starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down...");
            })
            .await
            .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

        tasks.shutdown().await;
        Ok(())
    }
}

/// Register the three scheduled jobs: daily aggregation, daily backup and
/// the weekly retention sweep. Each loop sleeps until its next local-time
/// slot and exits when the shutdown token fires.
fn spawn_scheduled_jobs(tasks: &mut BackgroundTasks, state: &ServerState) {
    let tz = state.config.timezone;

    let aggregator = Aggregator::new(state.pool.clone(), tz);
    let aggregation_hour = state.config.aggregation_hour;
    let token = tasks.shutdown_token();
    tasks.spawn("daily_aggregation", TaskKind::Periodic, async move {
        run_daily(token, aggregation_hour, tz, move || {
            let aggregator = aggregator.clone();
            async move {
                aggregator.run_for_previous_day().await.map(|_| ())
            }
        })
        .await;
    });

    let backup = BackupService::new(
        state.pool.clone(),
        state.config.backup_dir(),
        state.config.backup_collections.clone(),
        state.config.retention.clone(),
    );
    let backup_hour = state.config.backup_hour;
    let token = tasks.shutdown_token();
    let daily_backup = backup.clone();
    tasks.spawn("daily_backup", TaskKind::Periodic, async move {
        run_daily(token, backup_hour, tz, move || {
            let backup = daily_backup.clone();
            async move { backup.run_full_backup().await.map(|_| ()) }
        })
        .await;
    });

    let retention_weekday = state.config.retention_weekday;
    let retention_hour = state.config.retention_hour;
    let token = tasks.shutdown_token();
    tasks.spawn("retention_sweep", TaskKind::Periodic, async move {
        loop {
            let delay = next_weekly_delay(retention_weekday, retention_hour, tz);
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = backup.run_retention_sweep().await {
                error!(error = %e, "retention sweep failed");
            }
        }
    });
}

async fn run_daily<F, Fut>(token: CancellationToken, hour: u32, tz: chrono_tz::Tz, job: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = AppResult<()>>,
{
    loop {
        let delay = next_daily_delay(hour, tz);
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if let Err(e) = job().await {
            error!(error = %e, "scheduled job failed");
        }
    }
}
