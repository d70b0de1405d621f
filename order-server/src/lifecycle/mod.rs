//! Order lifecycle
//!
//! Creation and status transitions for orders. Creation validates and
//! prices an order inside one transaction; transitions go through guarded
//! UPDATEs so a target is applied at most once even under racing callers.
//!
//! Status graph:
//!
//! ```text
//! pending -> processing -> confirmed -> completed
//!    |           |    \        |
//!    |           |     `-> payment_failed -> confirmed | cancelled
//!    `-----------+--------- cancelled
//! ```

use std::sync::Arc;

use shared::request::{OrderLineInput, StatusTarget};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::db::models::{Order, OrderStatus};
use crate::db::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::notify::{Notification, Notifier, dispatch_best_effort};
use crate::utils::{AppError, AppResult};

/// Flat tax rate applied to every order subtotal
pub const TAX_RATE: f64 = 0.08;

/// Order lifecycle service
#[derive(Clone)]
pub struct LifecycleService {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    orders: OrderRepository,
    products: ProductRepository,
    users: UserRepository,
}

impl LifecycleService {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            products: ProductRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
            notifier,
        }
    }

    /// Create an order for `user_id`.
    ///
    /// The order row is written as `pending` first, so a validation
    /// failure leaves an auditable record: the row stays `pending` with
    /// `failure_reason` set, and no stock or counter is touched. On
    /// success the stock decrements, item snapshot, totals and user
    /// counters all commit atomically and the order lands in
    /// `processing`.
    pub async fn create_order(
        &self,
        user_id: &str,
        items: &[OrderLineInput],
    ) -> AppResult<Order> {
        let order_id = new_id();
        let now = now_millis();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, user_id, status, created_at) VALUES (?, ?, 'pending', ?)")
            .bind(&order_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if let Err(reason) = self.validate_and_fill(&mut tx, &order_id, user_id, items).await? {
            // Keep the pending row with its failure reason
            sqlx::query("UPDATE orders SET failure_reason = ? WHERE id = ?")
                .bind(&reason)
                .bind(&order_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            warn!(order_id = %order_id, user_id = %user_id, reason = %reason, "order validation failed");
            return Err(AppError::invalid_argument(reason));
        }

        tx.commit().await?;

        info!(order_id = %order_id, user_id = %user_id, "order created");

        let order = self
            .orders
            .find_by_id(&order_id)
            .await?
            .ok_or_else(|| AppError::internal("order vanished after creation"))?;

        dispatch_best_effort(
            self.notifier.as_ref(),
            &[Notification::new(
                user_id,
                "Order received",
                format!("Your order {} is being processed", order.id),
            )],
        )
        .await;

        Ok(order)
    }

    /// Validation and pricing inside the creation transaction.
    ///
    /// `Ok(Err(reason))` is a rejected order; `Ok(Ok(()))` means every
    /// mutation for the success path has been queued on `tx`.
    async fn validate_and_fill(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order_id: &str,
        user_id: &str,
        items: &[OrderLineInput],
    ) -> AppResult<Result<(), String>> {
        if items.is_empty() {
            return Ok(Err("order must contain at least one item".into()));
        }

        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        if user.is_none() {
            return Ok(Err(format!("user {user_id} does not exist")));
        }

        let mut subtotal = 0.0_f64;

        for item in items {
            if item.quantity <= 0 {
                return Ok(Err(format!(
                    "invalid quantity {} for product {}",
                    item.quantity, item.product_id
                )));
            }

            let product: Option<(f64, i64)> =
                sqlx::query_as("SELECT price, stock FROM products WHERE id = ?")
                    .bind(&item.product_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            let (price, _stock) = match product {
                Some(p) => p,
                None => return Ok(Err(format!("product {} does not exist", item.product_id))),
            };

            // Guarded decrement; losing a race reads as insufficient stock
            let decremented =
                sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?")
                    .bind(item.quantity)
                    .bind(&item.product_id)
                    .bind(item.quantity)
                    .execute(&mut **tx)
                    .await?;
            if decremented.rows_affected() == 0 {
                return Ok(Err(format!(
                    "insufficient stock for product {}",
                    item.product_id
                )));
            }

            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(price)
            .execute(&mut **tx)
            .await?;

            subtotal += price * item.quantity as f64;
        }

        let tax = subtotal * TAX_RATE;
        let total = subtotal + tax;

        sqlx::query(
            "UPDATE orders SET status = 'processing', subtotal = ?, tax = ?, total = ?,
                 processed_at = ?
             WHERE id = ?",
        )
        .bind(subtotal)
        .bind(tax)
        .bind(total)
        .bind(now_millis())
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query("UPDATE users SET order_count = order_count + 1, total_spent = total_spent + ? WHERE id = ?")
            .bind(total)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(Ok(()))
    }

    /// Apply a caller-requested status transition.
    ///
    /// Owners may move their own orders; admins may move any. Side
    /// effects (completed-order counter, stock restore) run only when
    /// the guarded UPDATE actually claimed the transition, which keeps
    /// them exactly-once under concurrent requests.
    pub async fn transition(
        &self,
        order_id: &str,
        target: StatusTarget,
        caller: &CurrentUser,
    ) -> AppResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))?;

        if order.user_id != caller.id && !caller.is_admin() {
            return Err(AppError::permission_denied(
                "cannot modify another user's order",
            ));
        }

        let accepted = match target {
            StatusTarget::Confirmed => self.orders.confirm(order_id).await?,
            StatusTarget::Completed => self.orders.complete(order_id, now_millis()).await?,
            StatusTarget::Cancelled => self.orders.cancel(order_id).await?,
        };

        if !accepted {
            let current = self
                .orders
                .current_status(order_id)
                .await?
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "unknown".into());
            return Err(AppError::invalid_argument(format!(
                "cannot transition order from {current} to {}",
                target_label(target)
            )));
        }

        match target {
            StatusTarget::Completed => {
                self.users.increment_completed(&order.user_id).await?;
            }
            StatusTarget::Cancelled => {
                // Give the reserved stock back
                for item in self.orders.items(order_id).await? {
                    self.products
                        .restore_stock(&item.product_id, item.quantity)
                        .await?;
                }
            }
            StatusTarget::Confirmed => {}
        }

        info!(order_id = %order_id, target = target_label(target), "order transitioned");

        let updated = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::internal("order vanished after transition"))?;

        dispatch_best_effort(
            self.notifier.as_ref(),
            &[Notification::new(
                &updated.user_id,
                "Order update",
                format!("Your order {} is now {}", updated.id, updated.status.as_str()),
            )],
        )
        .await;

        Ok(updated)
    }

    /// Fetch a single order with the owner-or-admin check applied
    pub async fn fetch_for(&self, order_id: &str, caller: &CurrentUser) -> AppResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))?;

        if order.user_id != caller.id && !caller.is_admin() {
            return Err(AppError::permission_denied(
                "cannot view another user's order",
            ));
        }

        Ok(order)
    }

    /// Current status of an order, if it exists
    pub async fn status_of(&self, order_id: &str) -> AppResult<Option<OrderStatus>> {
        Ok(self.orders.current_status(order_id).await?)
    }
}

fn target_label(target: StatusTarget) -> &'static str {
    match target {
        StatusTarget::Confirmed => "confirmed",
        StatusTarget::Completed => "completed",
        StatusTarget::Cancelled => "cancelled",
    }
}
