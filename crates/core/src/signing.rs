// Webhook payload signing
// Decision: HMAC-SHA256 over the exact body bytes, lowercase hex, no prefix

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event name on every delivery
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Header carrying the hex HMAC when the subscription has a secret
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

fn keyed(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Sign a request body with a subscription secret.
///
/// Must be called with the same bytes that are transmitted.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against a body. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac = keyed(secret);
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
