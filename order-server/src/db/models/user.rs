//! User and product models

use serde::{Deserialize, Serialize};

/// User entity
///
/// Counters are only ever mutated through atomic `UPDATE ... SET c = c + 1`
/// statements so concurrent orders cannot lose updates.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub subscription_status: String,
    pub order_count: i64,
    pub total_spent: f64,
    pub completed_order_count: i64,
    pub created_at: i64,
}

/// Product with its current inventory level
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub stock: i64,
}
