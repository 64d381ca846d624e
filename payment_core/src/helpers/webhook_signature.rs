//! # Webhook signature format
//!
//! The gateway authenticates its status callbacks by including a `signature_key` field in the payload. The signature
//! is the lowercase hex encoding of
//!
//! ```text
//!    SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key)
//! ```
//!
//! where `gross_amount` is the exact decimal string from the payload (re-formatting it would change the digest) and
//! `server_key` is the merchant's gateway credential. Anyone without the server key cannot forge a callback, and any
//! tampering with the order id, status code or amount invalidates the signature.
//!
//! Verification recomputes the digest and compares it against the supplied signature in fixed time
//! ([`subtle::ConstantTimeEq`]), so the comparison leaks nothing about how many leading bytes matched.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::gateway_types::WebhookNotification;

/// Computes the webhook signature for the given fields as a lowercase hex digest.
pub fn sign(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

/// Recomputes the signature from the notification's own fields and compares it against `signature_key`.
/// The comparison runs in fixed time. No side effects.
pub fn verify(notification: &WebhookNotification, server_key: &str) -> bool {
    let expected = sign(
        notification.order_id.as_str(),
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    expected.as_bytes().ct_eq(notification.signature_key.as_bytes()).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
        s
    })
}
