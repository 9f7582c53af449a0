//! Self-contained signed-token authentication for the diary relay.
//!
//! Two credential shapes live here:
//!
//! - [`jwt`] — a compact HS256 claims token carrying an identity, used by
//!   the browser client for every authenticated endpoint. Signing and
//!   verification are self-contained; no external identity provider is
//!   involved.
//! - [`capability`] — a single-field, single-purpose token authorizing one
//!   follow-on action for one specific resource (for example "generate one
//!   image for this diary date"), with a short absolute lifetime measured
//!   from its embedded timestamp.
//!
//! Both verifiers fail closed: any malformed shape, unsupported algorithm,
//! signature mismatch, or time-bound violation rejects the token outright.
//! Signature comparison is constant-time throughout.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod capability;
pub mod error;
pub mod jwt;

pub use error::AuthError;
pub use jwt::{Claims, CLOCK_SKEW_SECS};

/// Seconds since the Unix epoch, saturating at zero on a pre-epoch clock.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Milliseconds since the Unix epoch, saturating at zero on a pre-epoch clock.
pub fn unix_now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
