//! Rejection reasons for token verification.
//!
//! Callers normally collapse all of these into a single 401; the variants
//! exist so server-side logs can say why a token was refused.

use thiserror::Error;

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token does not have the expected shape (part count, encoding, JSON).
    #[error("token is malformed")]
    Malformed,

    /// Header names an algorithm other than the single supported one.
    /// Rejected before any signature work; this is the `alg: none` /
    /// downgrade class of forgery.
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,

    /// Recomputed MAC does not match the supplied signature.
    #[error("signature mismatch")]
    BadSignature,

    /// Mandatory claims missing or carrying the wrong type.
    #[error("invalid claims")]
    InvalidClaims,

    /// `exp` has passed (beyond the skew window for claims tokens, or the
    /// absolute TTL for capability tokens).
    #[error("token expired")]
    Expired,

    /// `nbf` lies further in the future than the skew window allows.
    #[error("token not yet valid")]
    NotYetValid,

    /// `iat` lies further in the future than the skew window allows.
    #[error("token issued in the future")]
    IssuedInFuture,
}
