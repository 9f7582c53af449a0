//! Atomic key-value store port and its REST adapter.
//!
//! The remote store is a managed Redis-compatible service reached over
//! plain HTTPS: one GET per command, path-encoded arguments, bearer-token
//! auth, and a `{"result": ...}` JSON envelope. Every operation is an
//! independent network call with its own failure mode. The client does NOT
//! retry — whether a failure is fail-open or fail-closed is a policy choice
//! that belongs to each caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;

/// TTL sentinel: key exists but carries no expiry.
pub const TTL_NO_EXPIRY: i64 = -1;
/// TTL sentinel: key does not exist.
pub const TTL_MISSING: i64 = -2;

/// Single-key atomic operations. Per-key atomicity (increment,
/// conditional-set) is the only guarantee; there is no cross-key ordering.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Atomically increment the integer at `key`, creating it at 0 first.
    /// Returns the post-increment value.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Set a time-to-live on `key`. Returns false when the key is absent.
    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// Remaining TTL in seconds, or [`TTL_NO_EXPIRY`] / [`TTL_MISSING`].
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Read `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomic test-and-set with TTL: writes only when `key` is absent.
    /// Returns whether the write happened.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError>;

    /// Unconditional write, no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// REST adapter for the remote store.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct Envelope {
    result: Value,
}

impl HttpStore {
    /// Default per-command request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            token: token.into(),
            request_timeout,
        }
    }

    /// Run one command, given as path segments (encoded into the URL path).
    async fn command(&self, segments: &[&str]) -> Result<Value, StoreError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| StoreError::Malformed(format!("bad store URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed("store URL cannot be a base".into()))?
            .extend(segments);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(envelope.result)
    }

    fn expect_int(result: Value) -> Result<i64, StoreError> {
        result
            .as_i64()
            .ok_or_else(|| StoreError::Malformed(format!("expected integer, got {result}")))
    }
}

#[async_trait]
impl AtomicStore for HttpStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        Self::expect_int(self.command(&["incr", key]).await?)
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let result = self
            .command(&["expire", key, &seconds.to_string()])
            .await?;
        Ok(Self::expect_int(result)? == 1)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        Self::expect_int(self.command(&["ttl", key]).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(&["get", key]).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(StoreError::Malformed(format!(
                "expected string or null, got {other}"
            ))),
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let result = self
            .command(&["set", key, value, "EX", &ttl_seconds.to_string(), "NX"])
            .await?;
        match result {
            // "OK" when the conditional write happened, null when the key
            // was already present.
            Value::String(s) if s == "OK" => Ok(true),
            Value::Null => Ok(false),
            other => Err(StoreError::Malformed(format!(
                "unexpected conditional-set result {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.command(&["set", key, value]).await? {
            Value::String(s) if s == "OK" => Ok(()),
            other => Err(StoreError::Malformed(format!(
                "unexpected set result {other}"
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // Result is the deleted-key count; 0 (already gone) is fine.
        Self::expect_int(self.command(&["del", key]).await?).map(|_| ())
    }
}
