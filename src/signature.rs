//! Webhook payload signature verification (HMAC-SHA256)

use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

/// Providers send the signature as "sha256=<hex>"
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies a provider webhook signature against the raw payload.
///
/// The shared secret is an explicit parameter; this function holds no state
/// and never panics. Malformed headers, bad hex, and mismatches all return
/// false. Callers log failures keyed by the delivery id.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let Some(provider_signature) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let provider_signature_bytes = match hex::decode(provider_signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    // Compute HMAC SHA256
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&provider_signature_bytes).is_ok()
}

/// Computes the signature header value for a payload.
///
/// Used by tests and delivery tooling to produce headers a provider would send.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    )
}
