//! In-process [`AtomicStore`] with real increment / conditional-set / TTL
//! semantics.
//!
//! For tests and single-instance local development only. Counters and locks
//! that must hold across stateless instances live in the remote store;
//! nothing process-local can provide that.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::{AtomicStore, TTL_MISSING, TTL_NO_EXPIRY};

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory store. Cheap to clone handles via `Arc` at the call site.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a live value, for test assertions.
    pub fn value_of(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.live(now))
            .map(|e| e.value.clone())
    }

    /// Whether a live entry carries an expiry, for test assertions.
    pub fn has_expiry(&self, key: &str) -> Option<bool> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.live(now))
            .map(|e| e.expires_at.is_some())
    }

    fn purge(entries: &mut HashMap<String, Entry>, now: Instant) {
        entries.retain(|_, e| e.live(now));
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, now);
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: "0".into(),
            expires_at: None,
        });
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::Malformed(format!("non-integer value at {key}")))?;
        entry.value = (current + 1).to_string();
        Ok(current + 1)
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, now);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + Duration::from_secs(seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, now);
        match entries.get(key) {
            None => Ok(TTL_MISSING),
            Some(Entry {
                expires_at: None, ..
            }) => Ok(TTL_NO_EXPIRY),
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ok((*at - now).as_secs().max(1) as i64),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, now);
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(true)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
