//! Background task management
//!
//! Registry for the server's long-running jobs (daily aggregation, daily
//! backup, weekly retention sweep). Tasks are wrapped to capture panics,
//! and all of them share one cancellation token for graceful shutdown.

use std::fmt;
use std::panic::AssertUnwindSafe;

use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Task type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Long-lived background worker
    Worker,
    /// Scheduled recurring job
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task registry
///
/// # Example
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn("daily_aggregation", TaskKind::Periodic, async move {
///     // job loop
/// });
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token tasks should select on to observe shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register and start a background task.
    ///
    /// The future is wrapped to catch panics; a panicking job is logged
    /// instead of silently disappearing.
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped_future = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Err(panic_info) => {
                    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked! This is a bug that should be reported."
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Graceful shutdown - cancel every task and wait for completion
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());

        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => {
                    tracing::debug!(task = %task.name, "Task completed");
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(task = %task.name, "Task cancelled");
                }
                Err(e) => {
                    tracing::error!(task = %task.name, error = ?e, "Task panicked");
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// Duration until the next occurrence of `hour:00` local time.
///
/// If that hour does not exist today (DST gap) the next day is used.
pub fn next_daily_delay(hour: u32, tz: Tz) -> std::time::Duration {
    let now = Utc::now().with_timezone(&tz);
    let mut date = now.date_naive();

    loop {
        if let Some(candidate) = date
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        {
            if candidate > now {
                let delta = candidate.signed_duration_since(now);
                return delta.to_std().unwrap_or(std::time::Duration::ZERO);
            }
        }
        date += ChronoDuration::days(1);
    }
}

/// Duration until the next `weekday` at `hour:00` local time.
pub fn next_weekly_delay(weekday: Weekday, hour: u32, tz: Tz) -> std::time::Duration {
    let now = Utc::now().with_timezone(&tz);
    let mut date = now.date_naive();

    loop {
        if date.weekday() == weekday {
            if let Some(candidate) = date
                .and_hms_opt(hour, 0, 0)
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            {
                if candidate > now {
                    let delta = candidate.signed_duration_since(now);
                    return delta.to_std().unwrap_or(std::time::Duration::ZERO);
                }
            }
        }
        date += ChronoDuration::days(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_delay_bounded_by_one_day() {
        let delay = next_daily_delay(2, chrono_tz::Europe::Madrid);
        assert!(delay <= std::time::Duration::from_secs(25 * 3600));
    }

    #[test]
    fn test_weekly_delay_bounded_by_one_week() {
        let delay = next_weekly_delay(Weekday::Sun, 4, chrono_tz::Europe::Madrid);
        assert!(delay <= std::time::Duration::from_secs(8 * 24 * 3600));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_tasks() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();

        tasks.spawn("sleeper", TaskKind::Worker, async move {
            token.cancelled().await;
        });

        assert_eq!(tasks.len(), 1);
        tasks.shutdown().await;
    }
}
