//! Notification dispatch
//!
//! Notifications are strictly best-effort: a failed or slow send must
//! never fail the operation that triggered it. Callers hand a batch to
//! [`dispatch_best_effort`] and move on; failures are logged and dropped.

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

/// A message addressed to one user
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivery channel seam; the server runs with [`LogNotifier`], tests
/// substitute recording or failing implementations.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Default channel: writes the notification to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(
            user_id = %notification.user_id,
            title = %notification.title,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Send a batch of notifications, swallowing every failure.
///
/// Sends run concurrently; each failure is logged with its recipient.
pub async fn dispatch_best_effort(notifier: &dyn Notifier, batch: &[Notification]) {
    if batch.is_empty() {
        return;
    }

    let sends = batch.iter().map(|n| async move {
        if let Err(e) = notifier.send(n).await {
            warn!(user_id = %n.user_id, error = %e, "notification delivery failed");
        }
    });

    join_all(sends).await;
}

#[cfg(test)]
pub mod testing {
    //! Test doubles shared by the service tests

    use std::sync::Mutex;

    use super::*;

    /// Records every notification it receives
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    /// Fails every send
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("channel down".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_records_all() {
        let notifier = RecordingNotifier::default();
        let batch = vec![
            Notification::new("u1", "Order update", "confirmed"),
            Notification::new("u2", "Order update", "completed"),
        ];

        dispatch_best_effort(&notifier, &batch).await;

        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let notifier = FailingNotifier;
        let batch = vec![Notification::new("u1", "Order update", "confirmed")];

        // Must not panic or propagate the error
        dispatch_best_effort(&notifier, &batch).await;
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let notifier = RecordingNotifier::default();
        dispatch_best_effort(&notifier, &[]).await;
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
