//! Coordination failure types.

use thiserror::Error;

/// A single store operation failed. The client never retries; callers
/// decide fail-open vs fail-closed per use.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store answered with a non-success HTTP status.
    #[error("store returned HTTP {0}")]
    Status(u16),

    /// Request never completed (connect, TLS, timeout, ...).
    #[error("store transport failure: {0}")]
    Transport(String),

    /// Store answered 2xx but the body was not the expected shape.
    #[error("store returned a malformed response: {0}")]
    Malformed(String),
}

/// Why a quota could not be consumed. All variants are infrastructure
/// failures and must be treated fail-closed; going over the limit is a
/// normal [`crate::quota::QuotaOutcome::Exceeded`], not an error.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The atomic increment returned something that is not a positive
    /// integer; the counter cannot be trusted.
    #[error("quota counter returned non-positive count {0}")]
    BadCount(i64),

    /// A first-of-day counter could not be confirmed to carry an expiry.
    /// An unbounded counter key would deny the identity forever and leak
    /// store memory, so the request is refused.
    #[error("could not confirm expiry on quota key {0}")]
    UnconfirmedExpiry(String),
}
