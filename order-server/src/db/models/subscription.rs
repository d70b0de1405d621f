//! Subscription record mirrored from the payment processor

use serde::{Deserialize, Serialize};

/// Subscription, keyed by the processor's subscription id.
///
/// Webhook delivery is at-least-once; updates are last-write-wins per id,
/// which is safe because the processor's event timestamps are monotonic
/// per subscription.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub plan: String,
    pub current_period_end: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
