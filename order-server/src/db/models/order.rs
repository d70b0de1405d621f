//! Order model and lifecycle state machine

use serde::{Deserialize, Serialize};

/// Order status enum
///
/// `pending → processing → confirmed → {completed | cancelled | payment_failed}`
///
/// `completed` and `cancelled` are terminal; `payment_failed` may recover to
/// `confirmed` once a later payment succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Completed,
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    /// Column/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PaymentFailed => "payment_failed",
        }
    }

    /// No transition is defined out of a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Valid source states for a given target
    pub fn valid_sources(target: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match target {
            Processing => &[Pending],
            Confirmed => &[Processing, PaymentFailed],
            Completed => &[Processing, Confirmed],
            Cancelled => &[Pending, Processing, Confirmed, PaymentFailed],
            PaymentFailed => &[Processing, Confirmed],
            Pending => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        OrderStatus::valid_sources(target).contains(self)
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub processed_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Ordered line item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for target in [
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::PaymentFailed,
        ] {
            assert!(!OrderStatus::Completed.can_transition_to(target));
            assert!(!OrderStatus::Cancelled.can_transition_to(target));
        }
    }

    #[test]
    fn payment_failed_can_recover() {
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn happy_path_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Completed));
    }
}
