//! HS256 claims-token codec and verifier.
//!
//! Token layout is the familiar three-part form
//! `base64url(header) . base64url(payload) . base64url(mac)` with the MAC
//! computed over the first two encoded parts. The verifier pins the
//! algorithm to HS256, compares signatures in constant time, and enforces
//! the time-bound claims with a symmetric clock-skew window.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::unix_now;

type HmacSha256 = Hmac<Sha256>;

/// The single supported signing algorithm. Anything else in the header is
/// treated as a forgery attempt.
const SUPPORTED_ALG: &str = "HS256";

/// Forgiveness window for clock drift between issuer and verifier, applied
/// symmetrically to `exp`, `nbf`, and `iat`.
pub const CLOCK_SKEW_SECS: i64 = 60;

/// Verified claim set. Immutable once returned by [`verify`].
///
/// Unknown payload fields are tolerated and dropped; the fields here are the
/// ones the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity the token was issued to.
    pub sub: String,
    /// Expiry, seconds since epoch. Mandatory.
    pub exp: i64,
    /// Issue time, seconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Not valid before, seconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    /// Claims for `subject`, issued now and expiring after `lifetime_secs`.
    pub fn for_subject(subject: impl Into<String>, lifetime_secs: i64) -> Self {
        let now = unix_now();
        Self {
            sub: subject.into(),
            exp: now + lifetime_secs,
            iat: Some(now),
            nbf: None,
        }
    }
}

/// Sign `claims` into a compact token. Deterministic, no side effects.
pub fn sign(claims: &Claims, secret: &[u8]) -> String {
    let header = serde_json::json!({ "alg": SUPPORTED_ALG, "typ": "JWT" });
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let payload = serde_json::to_string(claims).expect("claims serialize to JSON");
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let tag = mac_over(secret, &header_b64, &payload_b64);
    format!("{header_b64}.{payload_b64}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Verify `token` against `secret` at the current system time.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    verify_at(token, secret, unix_now())
}

/// Verify `token` against `secret` as of `now` (seconds since epoch).
///
/// Pure function of its inputs. Checks, in order: shape, pinned algorithm,
/// signature (constant time), payload decoding, `exp` (mandatory, numeric,
/// not past beyond skew), `nbf` and `iat` (numeric when present, not future
/// beyond skew). Any violation rejects the whole token.
pub fn verify_at(token: &str, secret: &[u8], now: i64) -> Result<Claims, AuthError> {
    let mut split = token.split('.');
    let (header_b64, payload_b64, sig_b64) =
        match (split.next(), split.next(), split.next(), split.next()) {
            (Some(h), Some(p), Some(s), None)
                if !h.is_empty() && !p.is_empty() && !s.is_empty() =>
            {
                (h, p, s)
            }
            _ => return Err(AuthError::Malformed),
        };

    // Algorithm pin, before the signature means anything.
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::Malformed)?;
    let header: Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::Malformed)?;
    if header.get("alg").and_then(Value::as_str) != Some(SUPPORTED_ALG) {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    let expected = mac_over(secret, header_b64, payload_b64);
    let supplied = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::BadSignature)?;
    if supplied.len() != expected.len()
        || !bool::from(supplied.as_slice().ct_eq(expected.as_slice()))
    {
        return Err(AuthError::BadSignature);
    }

    // Signature holds; the payload can now be trusted enough to decode.
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::Malformed)?;
    let payload: Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::Malformed)?;
    let fields = payload.as_object().ok_or(AuthError::Malformed)?;

    let exp = numeric_claim(fields, "exp")?.ok_or(AuthError::InvalidClaims)?;
    if exp <= now - CLOCK_SKEW_SECS {
        return Err(AuthError::Expired);
    }

    if let Some(nbf) = numeric_claim(fields, "nbf")? {
        if nbf > now + CLOCK_SKEW_SECS {
            return Err(AuthError::NotYetValid);
        }
    }

    if let Some(iat) = numeric_claim(fields, "iat")? {
        if iat > now + CLOCK_SKEW_SECS {
            return Err(AuthError::IssuedInFuture);
        }
    }

    serde_json::from_value(payload).map_err(|_| AuthError::InvalidClaims)
}

/// Read an optional numeric claim. Present-but-wrong-type is a hard reject,
/// not an absence.
fn numeric_claim(fields: &Map<String, Value>, name: &str) -> Result<Option<i64>, AuthError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or(AuthError::InvalidClaims),
    }
}

fn mac_over(secret: &[u8], header_b64: &str, payload_b64: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
