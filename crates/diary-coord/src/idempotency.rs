//! Completion ledger and mutual-exclusion lock for side-effecting actions.
//!
//! Both live in the remote store, keyed by `(action, resource)`:
//!
//! - `{action}:posted:{resource}` — written exactly once, after the action
//!   first completes, with no expiry. Its presence short-circuits every
//!   later attempt to a replay of the recorded result.
//! - `{action}:lock:{resource}` — created only-if-absent with a short TTL.
//!   Holders must release on every exit path; the TTL is the backstop when
//!   release itself fails.
//!
//! Reads of the ledger and lock acquisition surface store failures to the
//! caller (fail-closed — an unreadable ledger must never be taken as "not
//! done yet"). Recording and release are best-effort: by the time they run
//! the response is already decided, so failures are logged, not surfaced.

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::error::StoreError;
use crate::store::AtomicStore;

/// Default lifetime for the mutual-exclusion lock.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

const LOCK_SENTINEL: &str = "1";

/// Duplicate-prevention and serialization for one action family.
#[derive(Clone)]
pub struct IdempotencyManager {
    store: Arc<dyn AtomicStore>,
}

impl IdempotencyManager {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self { store }
    }

    /// Look up a previously recorded completion. A store failure here is
    /// the caller's cue to refuse the request.
    pub async fn check_completed(
        &self,
        action: &str,
        resource: &str,
    ) -> Result<Option<String>, StoreError> {
        self.store.get(&completion_key(action, resource)).await
    }

    /// Try to take the per-resource lock. `Ok(false)` means another attempt
    /// is currently in flight — a normal conflict, not an error.
    pub async fn acquire_lock(
        &self,
        action: &str,
        resource: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.store
            .set_if_absent(&lock_key(action, resource), LOCK_SENTINEL, ttl.as_secs())
            .await
    }

    /// Record a completed action. Best-effort: the action already
    /// succeeded, so a write failure is logged and swallowed.
    pub async fn record_completed(&self, action: &str, resource: &str, result: &str) {
        let key = completion_key(action, resource);
        if let Err(e) = self.store.set(&key, result).await {
            error!(key, error = %e, "failed to record completion");
        }
    }

    /// Release the per-resource lock. Best-effort: the response is already
    /// decided, and the lock TTL bounds the damage if this fails.
    pub async fn release_lock(&self, action: &str, resource: &str) {
        let key = lock_key(action, resource);
        if let Err(e) = self.store.delete(&key).await {
            error!(key, error = %e, "failed to release lock");
        }
    }
}

fn completion_key(action: &str, resource: &str) -> String {
    format!("{action}:posted:{resource}")
}

fn lock_key(action: &str, resource: &str) -> String {
    format!("{action}:lock:{resource}")
}
