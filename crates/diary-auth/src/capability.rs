//! Resource-scoped capability token.
//!
//! A narrower credential than the claims token in [`crate::jwt`]: it
//! authorizes exactly one follow-on action for one named resource, within a
//! short absolute lifetime. The wire form is `"{issued_ms}:{hex_mac}"`
//! where the MAC covers `"{resource}:{issued_ms}"` under a dedicated
//! secret. Issuer and verifier are the same process family, so no
//! clock-skew forgiveness is applied — the TTL is absolute.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::unix_now_millis;

type HmacSha256 = Hmac<Sha256>;

/// Default validity window measured from the embedded issue timestamp.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Issue a capability token for `resource` at the current time.
pub fn issue(resource: &str, secret: &[u8]) -> String {
    issue_at(resource, secret, unix_now_millis())
}

/// Issue a capability token for `resource` at `now_ms`.
pub fn issue_at(resource: &str, secret: &[u8], now_ms: u64) -> String {
    format!("{now_ms}:{}", hex::encode(tag(resource, secret, now_ms)))
}

/// Verify a capability token for `resource` at the current time.
pub fn verify(token: &str, resource: &str, secret: &[u8], ttl: Duration) -> Result<(), AuthError> {
    verify_at(token, resource, secret, ttl, unix_now_millis())
}

/// Verify a capability token for `resource` as of `now_ms`.
///
/// Rejects on shape, on a timestamp outside `[now - ttl, now]` (tokens
/// "from the future" are as invalid as stale ones), and on MAC mismatch,
/// compared in constant time.
pub fn verify_at(
    token: &str,
    resource: &str,
    secret: &[u8],
    ttl: Duration,
    now_ms: u64,
) -> Result<(), AuthError> {
    let (ts_part, mac_part) = token.split_once(':').ok_or(AuthError::Malformed)?;
    if mac_part.contains(':') {
        return Err(AuthError::Malformed);
    }
    let issued_ms: u64 = ts_part.parse().map_err(|_| AuthError::Malformed)?;
    if issued_ms == 0 {
        return Err(AuthError::Malformed);
    }

    if now_ms < issued_ms || now_ms - issued_ms > ttl.as_millis() as u64 {
        return Err(AuthError::Expired);
    }

    let supplied = hex::decode(mac_part).map_err(|_| AuthError::Malformed)?;
    let expected = tag(resource, secret, issued_ms);
    if supplied.len() != expected.len()
        || !bool::from(supplied.as_slice().ct_eq(expected.as_slice()))
    {
        return Err(AuthError::BadSignature);
    }

    Ok(())
}

fn tag(resource: &str, secret: &[u8], issued_ms: u64) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(resource.as_bytes());
    mac.update(b":");
    mac.update(issued_ms.to_string().as_bytes());
    mac.finalize().into_bytes().to_vec()
}
