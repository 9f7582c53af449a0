//! Per-identity daily quotas, counted in the remote store.
//!
//! Counters are keyed `{scope}:{identity}:{YYYY-MM-DD}` on the UTC calendar
//! day and expire after 24 hours. The guard is fail-closed end to end: an
//! unreachable counter store is never read as "nobody has used their quota
//! yet", and a counter that cannot be confirmed to expire is refused
//! outright rather than left to grow (and deny) forever.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::error::QuotaError;
use crate::store::{AtomicStore, TTL_NO_EXPIRY};

const DAY_SECS: u64 = 86_400;

/// Result of a successful quota consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// Within the limit; `count` is this request's position for the day.
    Allowed { count: i64 },
    /// Over the limit. Expected and reportable, distinct from
    /// infrastructure failure.
    Exceeded { count: i64, limit: i64 },
}

/// Daily-quota guard over the atomic store.
#[derive(Clone)]
pub struct QuotaGuard {
    store: Arc<dyn AtomicStore>,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    /// Count one use of `scope` by `identity` against `daily_limit`, for
    /// today (UTC).
    pub async fn consume(
        &self,
        scope: &str,
        identity: &str,
        daily_limit: i64,
    ) -> Result<QuotaOutcome, QuotaError> {
        self.consume_on(scope, identity, daily_limit, Utc::now().date_naive())
            .await
    }

    /// Same as [`consume`](Self::consume) with an explicit day, so tests
    /// can pin the calendar.
    pub async fn consume_on(
        &self,
        scope: &str,
        identity: &str,
        daily_limit: i64,
        day: NaiveDate,
    ) -> Result<QuotaOutcome, QuotaError> {
        let key = day_key(scope, identity, day);

        let count = self.store.increment(&key).await?;
        if count < 1 {
            return Err(QuotaError::BadCount(count));
        }

        // First write of the day owns putting the 24h expiry in place.
        if count == 1 {
            self.ensure_expiry(&key).await?;
        }

        if count > daily_limit {
            return Ok(QuotaOutcome::Exceeded {
                count,
                limit: daily_limit,
            });
        }
        Ok(QuotaOutcome::Allowed { count })
    }

    /// Confirm the counter key carries an expiry, or refuse the request.
    ///
    /// A failed expiry call is re-checked against the live TTL: a positive
    /// TTL means a concurrent first-writer already won the race; the
    /// no-expiry sentinel earns exactly one retry. Anything that leaves the
    /// expiry unconfirmed is fail-closed.
    async fn ensure_expiry(&self, key: &str) -> Result<(), QuotaError> {
        match self.store.set_expiry(key, DAY_SECS).await {
            Ok(true) => return Ok(()),
            Ok(false) => warn!(key, "expiry call reported key absent, re-checking ttl"),
            Err(e) => warn!(key, error = %e, "expiry call failed, re-checking ttl"),
        }

        match self.store.ttl(key).await {
            Ok(ttl) if ttl > 0 => Ok(()),
            Ok(ttl) if ttl == TTL_NO_EXPIRY => match self.store.set_expiry(key, DAY_SECS).await {
                Ok(true) => Ok(()),
                _ => Err(QuotaError::UnconfirmedExpiry(key.to_string())),
            },
            _ => Err(QuotaError::UnconfirmedExpiry(key.to_string())),
        }
    }
}

fn day_key(scope: &str, identity: &str, day: NaiveDate) -> String {
    format!("{scope}:{identity}:{}", day.format("%Y-%m-%d"))
}
