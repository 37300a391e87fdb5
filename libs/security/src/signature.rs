//! HMAC-SHA256 webhook signatures.
//!
//! The platform signs the raw request body with the shared secret and sends
//! the lowercase hex digest in `X-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

fn digest(secret: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    digest(secret, body).map(hex::encode).unwrap_or_default()
}

fn parse_signature(signature: &str) -> Option<Vec<u8>> {
    let trimmed = signature.trim();
    let value = trimmed.strip_prefix("sha256=").unwrap_or(trimmed);
    hex::decode(value).ok()
}

/// Checks `signature` against the body in constant time. Undecodable hex
/// never matches.
pub fn verify_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Some(provided) = parse_signature(signature) else {
        return false;
    };
    let Some(expected) = digest(secret, body) else {
        return false;
    };
    provided.len() == expected.len() && provided.ct_eq(&expected).into()
}
