//! Callable request payloads
//!
//! Typed request bodies for the RPC-style endpoints. Shapes are validated
//! by serde at the boundary; anything that fails to deserialize is rejected
//! as `invalid-argument` before any business logic runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One ordered line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: i64,
}

/// POST /api/orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineInput>,
}

/// Externally requestable lifecycle targets
///
/// `processing` and `payment_failed` are driven by the server itself
/// (creation and the payment webhook) and deliberately absent here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTarget {
    Confirmed,
    Completed,
    Cancelled,
}

/// POST /api/orders/{id}/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: StatusTarget,
}

/// POST /api/events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEventRequest {
    pub name: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

/// POST /api/events/page-view (anonymous)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageViewRequest {
    pub path: String,
}

/// POST /api/reports/run — recompute a specific day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReportRequest {
    /// ISO date, YYYY-MM-DD
    pub date: String,
}
