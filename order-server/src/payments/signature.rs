//! Webhook signature verification (HMAC-SHA256)
//!
//! The processor signs `"{timestamp}.{body}"` with the shared secret and
//! sends `t=<unix>,v1=<hex>` in the signature header. Verification is
//! constant-time, and events older than five minutes are rejected to
//! block replays.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Maximum accepted age of a signed event, in seconds
const TOLERANCE_SECS: i64 = 300;

pub fn verify_signature(payload: &[u8], sig_header: &str, secret: &str) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Produce a valid signature header for a payload, test-side counterpart
/// of [`verify_signature`].
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={sig}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());
        assert!(verify_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());
        assert!(verify_signature(payload, &header, "whsec_other").is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());
        assert!(verify_signature(br#"{"id":"evt_2"}"#, &header, "whsec_test").is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let stale = chrono::Utc::now().timestamp() - 600;
        let header = sign(payload, "whsec_test", stale);
        assert!(verify_signature(payload, &header, "whsec_test").is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        assert!(verify_signature(payload, "garbage", "whsec_test").is_err());
        assert!(verify_signature(payload, "t=123", "whsec_test").is_err());
        assert!(verify_signature(payload, "v1=abcd", "whsec_test").is_err());
    }
}
