//! Key/value store with per-entry expiration.
//!
//! Expiry is lazy: an entry is checked (and evicted) only when read. There is no size
//! bound, the cache only ever holds a handful of well-known keys.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};

use super::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// An entry is fresh strictly before `timestamp + ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        match self.timestamp.checked_add_signed(ttl) {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

pub struct TtlCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    /// Stores `value`, overwriting any existing entry.
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            timestamp: self.clock.now(),
            ttl,
        };
        self.entries.insert(key.into(), entry);
    }

    /// Returns the value when fresh; an expired entry is evicted.
    pub fn get(&mut self, key: &str) -> Option<T> {
        if self.evict_if_expired(key) {
            return None;
        }
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn has(&mut self, key: &str) -> bool {
        !self.evict_if_expired(key) && self.entries.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_expired(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_fresh(now));
        if expired {
            self.entries.remove(key);
            tracing::trace!(key, "cache entry expired");
        }
        expired
    }
}

impl<T> std::fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
