//! Payment webhook handler
//!
//! POST /webhooks/payments — raw body in, signature verified, then the
//! event is claimed in `processed_webhook_events` before any side effect
//! runs. The insert-first claim is what makes redelivery safe: a
//! duplicate event id affects nothing and returns 200.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;

use shared::util::now_millis;

use crate::core::ServerState;
use crate::db::repository::{OrderRepository, SubscriptionRepository, UserRepository};
use crate::db::repository::subscription::SubscriptionUpsert;
use crate::notify::{Notification, dispatch_best_effort};
use crate::payments::signature::verify_signature;

/// Envelope shared by every event the processor sends
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: Value,
}

/// Handle an incoming payment webhook event.
///
/// Must receive the raw body (not parsed JSON) for HMAC verification.
/// Accepted events are acknowledged with `200 {"received": true}`.
pub async fn handle_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let status = process(state, headers, body).await;
    if status == StatusCode::OK {
        (status, Json(serde_json::json!({ "received": true }))).into_response()
    } else {
        status.into_response()
    }
}

async fn process(state: ServerState, headers: HeaderMap, body: Bytes) -> StatusCode {
    let sig_header = match headers.get("signature").and_then(|v| v.to_str().ok()) {
        Some(s) => s,
        None => {
            tracing::warn!("Missing webhook signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = verify_signature(&body, sig_header, &state.config.webhook_secret) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    let event: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::info!(event_type = %event.event_type, event_id = %event.id, "Received payment webhook");

    // Idempotency: INSERT first, check rows_affected (eliminates TOCTOU race)
    let insert_result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
         VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(&event.id)
    .bind(&event.event_type)
    .bind(now_millis())
    .execute(&state.pool)
    .await;

    match insert_result {
        Ok(r) if r.rows_affected() == 0 => {
            tracing::info!(event_id = %event.id, "Duplicate webhook event, skipping");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        Ok(_) => {} // New event, proceed
    }

    let status = match event.event_type.as_str() {
        "payment_intent.succeeded" => handle_payment_succeeded(&state, &event.data.object).await,
        "payment_intent.payment_failed" => handle_payment_failed(&state, &event.data.object).await,
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_upsert(&state, &event.data.object).await
        }
        "customer.subscription.deleted" => {
            handle_subscription_deleted(&state, &event.data.object).await
        }
        "invoice.paid" => handle_invoice_paid(&state, &event.data.object).await,
        "invoice.payment_failed" => handle_invoice_failed(&state, &event.data.object).await,
        other => {
            tracing::debug!(event_type = other, "Unhandled webhook event type");
            StatusCode::OK
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        // Release the claim so the processor's retry is not dropped as a duplicate
        if let Err(e) = sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = ?")
            .bind(&event.id)
            .execute(&state.pool)
            .await
        {
            tracing::error!(%e, event_id = %event.id, "DB error releasing webhook event claim");
        }
    }

    status
}

fn metadata_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get("metadata").and_then(|m| m[key].as_str())
}

/// payment_intent.succeeded → confirm the referenced order
async fn handle_payment_succeeded(state: &ServerState, obj: &Value) -> StatusCode {
    let order_id = match metadata_str(obj, "order_id") {
        Some(id) => id,
        None => {
            // Not an order payment (or a misconfigured intent); drop it
            tracing::warn!("payment_intent.succeeded without order_id metadata");
            return StatusCode::OK;
        }
    };

    let orders = OrderRepository::new(state.pool.clone());
    match orders.confirm(order_id).await {
        Ok(true) => {
            tracing::info!(order_id = %order_id, "order confirmed by payment");
            if let Ok(Some(order)) = orders.find_by_id(order_id).await {
                dispatch_best_effort(
                    state.notifier.as_ref(),
                    &[Notification::new(
                        &order.user_id,
                        "Payment received",
                        format!("Your order {} is confirmed", order.id),
                    )],
                )
                .await;
            }
            StatusCode::OK
        }
        Ok(false) => {
            // Unknown order or one that already left the payable states
            tracing::warn!(order_id = %order_id, "payment succeeded for non-confirmable order");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, "DB error confirming order");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// payment_intent.payment_failed → mark the order payment_failed
async fn handle_payment_failed(state: &ServerState, obj: &Value) -> StatusCode {
    let order_id = match metadata_str(obj, "order_id") {
        Some(id) => id,
        None => {
            tracing::warn!("payment_intent.payment_failed without order_id metadata");
            return StatusCode::OK;
        }
    };

    let reason = obj
        .get("last_payment_error")
        .and_then(|e| e["message"].as_str())
        .unwrap_or("payment declined");

    let orders = OrderRepository::new(state.pool.clone());
    match orders.fail_payment(order_id, reason).await {
        Ok(accepted) => {
            if accepted {
                tracing::info!(order_id = %order_id, reason = reason, "order payment failed");
                if let Ok(Some(order)) = orders.find_by_id(order_id).await {
                    dispatch_best_effort(
                        state.notifier.as_ref(),
                        &[Notification::new(
                            &order.user_id,
                            "Payment failed",
                            format!("Payment for order {} failed: {reason}", order.id),
                        )],
                    )
                    .await;
                }
            } else {
                tracing::warn!(order_id = %order_id, "payment failure for non-failable order");
            }
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, "DB error failing order payment");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// customer.subscription.created|updated → upsert, mirror onto the user
async fn handle_subscription_upsert(state: &ServerState, obj: &Value) -> StatusCode {
    let subscription_id = match obj["id"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!("subscription event missing id");
            return StatusCode::OK;
        }
    };

    let user_id = match metadata_str(obj, "user_id") {
        Some(u) => u.to_string(),
        None => {
            // Updates may omit metadata; fall back to the stored mapping
            let subs = SubscriptionRepository::new(state.pool.clone());
            match subs.find_user_id(subscription_id).await {
                Ok(Some(u)) => u,
                Ok(None) => {
                    tracing::warn!(subscription_id = %subscription_id, "subscription event without user mapping");
                    return StatusCode::OK;
                }
                Err(e) => {
                    tracing::error!(%e, "DB error resolving subscription user");
                    return StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
        }
    };

    let status = obj["status"].as_str().unwrap_or("active");
    let plan = metadata_str(obj, "plan").unwrap_or("basic");
    let period_end = obj["current_period_end"].as_i64().map(|s| s * 1000);

    let subs = SubscriptionRepository::new(state.pool.clone());
    let upsert = SubscriptionUpsert {
        id: subscription_id,
        user_id: &user_id,
        status,
        plan,
        current_period_end: period_end,
        now: now_millis(),
    };
    if let Err(e) = subs.upsert(&upsert).await {
        tracing::error!(%e, "DB error upserting subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let users = UserRepository::new(state.pool.clone());
    if let Err(e) = users.set_subscription_status(&user_id, status).await {
        tracing::error!(%e, "DB error mirroring subscription status");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(subscription_id = %subscription_id, status = status, "subscription upserted");
    StatusCode::OK
}

/// customer.subscription.deleted → cancel, reset the user's status
async fn handle_subscription_deleted(state: &ServerState, obj: &Value) -> StatusCode {
    let subscription_id = match obj["id"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!("subscription.deleted missing id");
            return StatusCode::OK;
        }
    };

    let subs = SubscriptionRepository::new(state.pool.clone());
    let user_id = match subs.find_user_id(subscription_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!(subscription_id = %subscription_id, "deleted subscription was never seen");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error resolving subscription user");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if let Err(e) = subs.update_status(subscription_id, "canceled", now_millis()).await {
        tracing::error!(%e, "DB error cancelling subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let users = UserRepository::new(state.pool.clone());
    if let Err(e) = users.set_subscription_status(&user_id, "none").await {
        tracing::error!(%e, "DB error resetting user subscription status");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(subscription_id = %subscription_id, "subscription cancelled");
    StatusCode::OK
}

/// invoice.paid → extend the subscription period
async fn handle_invoice_paid(state: &ServerState, obj: &Value) -> StatusCode {
    let subscription_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => return StatusCode::OK,
    };
    let period_end = obj["period_end"].as_i64().map(|s| s * 1000);

    let subs = SubscriptionRepository::new(state.pool.clone());
    if let Some(end) = period_end {
        if let Err(e) = subs.set_period_end(subscription_id, end, now_millis()).await {
            tracing::error!(%e, "DB error extending subscription period");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    if let Err(e) = subs.update_status(subscription_id, "active", now_millis()).await {
        tracing::error!(%e, "DB error activating subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(user_id)) = subs.find_user_id(subscription_id).await {
        let users = UserRepository::new(state.pool.clone());
        if let Err(e) = users.set_subscription_status(&user_id, "active").await {
            tracing::error!(%e, "DB error mirroring subscription status");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    StatusCode::OK
}

/// invoice.payment_failed → subscription goes past_due
async fn handle_invoice_failed(state: &ServerState, obj: &Value) -> StatusCode {
    let subscription_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => return StatusCode::OK,
    };

    let subs = SubscriptionRepository::new(state.pool.clone());
    if let Err(e) = subs.update_status(subscription_id, "past_due", now_millis()).await {
        tracing::error!(%e, "DB error marking subscription past_due");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(user_id)) = subs.find_user_id(subscription_id).await {
        let users = UserRepository::new(state.pool.clone());
        if let Err(e) = users.set_subscription_status(&user_id, "past_due").await {
            tracing::error!(%e, "DB error mirroring subscription status");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    tracing::warn!(subscription_id = %subscription_id, "subscription payment failed");
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use sqlx::SqlitePool;

    use super::*;
    use crate::db::DbService;
    use crate::db::repository::user::UserCreate;
    use crate::db::repository::{ProductRepository, UserRepository};
    use crate::lifecycle::LifecycleService;
    use crate::notify::testing::RecordingNotifier;
    use crate::payments::signature::sign;

    async fn setup() -> (ServerState, SqlitePool) {
        let db = DbService::in_memory().await.unwrap();
        let state = ServerState::for_tests(db.pool.clone()).await;
        (state, db.pool)
    }

    async fn seed_order(pool: &SqlitePool) -> String {
        UserRepository::new(pool.clone())
            .create(UserCreate {
                id: "u1".into(),
                email: "u1@example.com".into(),
                display_name: None,
                role: "customer".into(),
            })
            .await
            .unwrap();
        ProductRepository::new(pool.clone())
            .create("p1", "Test product", 10.0, 5)
            .await
            .unwrap();

        let lifecycle = LifecycleService::new(
            pool.clone(),
            Arc::new(RecordingNotifier::default()),
        );
        let order = lifecycle
            .create_order(
                "u1",
                &[shared::request::OrderLineInput {
                    product_id: "p1".into(),
                    quantity: 1,
                }],
            )
            .await
            .unwrap();
        order.id
    }

    fn signed_headers(body: &[u8], secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let sig = sign(body, secret, chrono::Utc::now().timestamp());
        headers.insert("signature", sig.parse().unwrap());
        headers
    }

    async fn deliver(state: &ServerState, event: &Value) -> StatusCode {
        let body = serde_json::to_vec(event).unwrap();
        let headers = signed_headers(&body, &state.config.webhook_secret);
        handle_webhook(State(state.clone()), headers, Bytes::from(body))
            .await
            .status()
    }

    async fn order_status(pool: &SqlitePool, id: &str) -> String {
        let row: (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_without_side_effects() {
        let (state, pool) = setup().await;

        let body = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "metadata": { "order_id": "o1" } } }
        }))
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("signature", "t=1,v1=deadbeef".parse().unwrap());

        let response = handle_webhook(State(state), headers, Bytes::from(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_webhook_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_payment_success_confirms_order() {
        let (state, pool) = setup().await;
        let order_id = seed_order(&pool).await;

        let status = deliver(
            &state,
            &json!({
                "id": "evt_1",
                "type": "payment_intent.succeeded",
                "data": { "object": { "metadata": { "order_id": order_id } } }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(order_status(&pool, &order_id).await, "confirmed");
    }

    #[tokio::test]
    async fn test_payment_failure_records_reason() {
        let (state, pool) = setup().await;
        let order_id = seed_order(&pool).await;

        deliver(
            &state,
            &json!({
                "id": "evt_1",
                "type": "payment_intent.payment_failed",
                "data": { "object": {
                    "metadata": { "order_id": order_id },
                    "last_payment_error": { "message": "card declined" }
                } }
            }),
        )
        .await;

        let row: (String, Option<String>) =
            sqlx::query_as("SELECT status, failure_reason FROM orders WHERE id = ?")
                .bind(&order_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(row.0, "payment_failed");
        assert_eq!(row.1.as_deref(), Some("card declined"));
    }

    #[tokio::test]
    async fn test_duplicate_event_skipped() {
        let (state, pool) = setup().await;
        let order_id = seed_order(&pool).await;

        let event = json!({
            "id": "evt_dup",
            "type": "payment_intent.payment_failed",
            "data": { "object": { "metadata": { "order_id": order_id } } }
        });

        assert_eq!(deliver(&state, &event).await, StatusCode::OK);
        assert_eq!(order_status(&pool, &order_id).await, "payment_failed");

        // Recovery path, then a redelivery of the same event id
        let lifecycle = LifecycleService::new(pool.clone(), state.notifier.clone());
        let user = crate::auth::CurrentUser {
            id: "u1".into(),
            role: "customer".into(),
        };
        lifecycle
            .transition(&order_id, shared::request::StatusTarget::Confirmed, &user)
            .await
            .unwrap();

        assert_eq!(deliver(&state, &event).await, StatusCode::OK);
        // Duplicate is dropped: the order keeps its recovered status
        assert_eq!(order_status(&pool, &order_id).await, "confirmed");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_webhook_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_failed_handler_releases_claim_for_retry() {
        let (state, pool) = setup().await;
        let order_id = seed_order(&pool).await;

        let event = json!({
            "id": "evt_retry",
            "type": "payment_intent.succeeded",
            "data": { "object": { "metadata": { "order_id": order_id } } }
        });

        // Hide the orders table so the handler hits a DB error mid-event
        sqlx::query("ALTER TABLE orders RENAME TO orders_hidden")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(
            deliver(&state, &event).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        sqlx::query("ALTER TABLE orders_hidden RENAME TO orders")
            .execute(&pool)
            .await
            .unwrap();

        // The claim was released, so the redelivery applies the event
        let claims: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_webhook_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(claims.0, 0);

        assert_eq!(deliver(&state, &event).await, StatusCode::OK);
        assert_eq!(order_status(&pool, &order_id).await, "confirmed");
    }

    #[tokio::test]
    async fn test_missing_order_mapping_dropped() {
        let (state, pool) = setup().await;

        let status = deliver(
            &state,
            &json!({
                "id": "evt_1",
                "type": "payment_intent.succeeded",
                "data": { "object": { "metadata": {} } }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orders.0, 0);
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let (state, pool) = setup().await;
        UserRepository::new(pool.clone())
            .create(UserCreate {
                id: "u1".into(),
                email: "u1@example.com".into(),
                display_name: None,
                role: "customer".into(),
            })
            .await
            .unwrap();

        deliver(
            &state,
            &json!({
                "id": "evt_1",
                "type": "customer.subscription.created",
                "data": { "object": {
                    "id": "sub_1",
                    "status": "active",
                    "current_period_end": 1_900_000_000,
                    "metadata": { "user_id": "u1", "plan": "pro" }
                } }
            }),
        )
        .await;

        let user = UserRepository::new(pool.clone())
            .find_by_id("u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.subscription_status, "active");

        // Deletion resets the mirror even without metadata
        deliver(
            &state,
            &json!({
                "id": "evt_2",
                "type": "customer.subscription.deleted",
                "data": { "object": { "id": "sub_1" } }
            }),
        )
        .await;

        let user = UserRepository::new(pool.clone())
            .find_by_id("u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.subscription_status, "none");

        let row: (String,) = sqlx::query_as("SELECT status FROM subscriptions WHERE id = 'sub_1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, "canceled");
    }

    #[tokio::test]
    async fn test_unrecognized_event_acknowledged() {
        let (state, _pool) = setup().await;

        let status = deliver(
            &state,
            &json!({
                "id": "evt_1",
                "type": "charge.refunded",
                "data": { "object": {} }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }
}
