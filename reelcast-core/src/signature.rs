//! Request signing
//!
//! State-mutating requests carry two headers:
//! - `X-Timestamp`: Unix seconds at which the client signed the request
//! - `X-Signature`: hex `HMAC-SHA256(secret, "<timestamp>:<canonical body>")`
//!
//! The canonical body is the JSON payload parsed and re-serialised compactly,
//! so both sides agree on the signed bytes regardless of client whitespace or
//! key order.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Accepted clock skew between client and server, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 5 * 60;

/// Returns the canonical form of a raw JSON body.
///
/// An empty body is treated as an empty object.
pub fn canonical_body(raw: &[u8]) -> Result<String, serde_json::Error> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok("{}".to_string());
    }
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    serde_json::to_string(&value)
}

/// Builds the exact message that gets signed.
pub fn signing_input(timestamp: i64, canonical: &str) -> String {
    format!("{}:{}", timestamp, canonical)
}

/// Signs a canonical body, returning the lowercase hex digest.
pub fn sign(secret: &str, timestamp: i64, canonical: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(signing_input(timestamp, canonical).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex signature in constant time.
pub fn verify(secret: &str, timestamp: i64, canonical: &str, signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = mac_for(secret);
    mac.update(signing_input(timestamp, canonical).as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}
