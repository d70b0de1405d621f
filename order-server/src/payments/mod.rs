//! Payment webhook processing
//!
//! Signature verification plus the event handler for the payment
//! processor's webhook deliveries (`POST /webhooks/payments`).

pub mod signature;
pub mod webhook;

pub use webhook::handle_webhook;
