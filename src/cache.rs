//! # Timed Cache
//! Per-key time-boxed memoization for fetched payloads.
//!
//! An entry is valid while `now < expires_at`. Expired entries are kept
//! in the map until overwritten or explicitly invalidated, so a caller
//! whose refetch just failed can still read the last-known value.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Instant,
}

/// Thread-safe map of `key -> (value, expiry)`.
///
/// Presence (`get`) and freshness (`is_valid`) are separate questions:
/// `get` returns whatever is stored regardless of age, and callers on a
/// freshness-sensitive path must check `is_valid` first.
#[derive(Debug)]
pub struct TimedCache<T> {
    inner: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone> TimedCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// True iff an entry exists for `key` and has not expired.
    pub fn is_valid(&self, key: &str) -> bool {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .get(key)
            .map(|e| Instant::now() < e.expires_at)
            .unwrap_or(false)
    }

    /// Returns the cached value regardless of validity.
    pub fn get(&self, key: &str) -> Option<T> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.get(key).map(|e| e.value.clone())
    }

    /// Stores `value` under `key`, valid for `ttl` from now. Overwrites
    /// any prior entry unconditionally; concurrent writers to the same
    /// key resolve last-write-wins.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.insert(key.into(), entry);
    }

    /// Removes one entry. Returns true if it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.remove(key).is_some()
    }

    /// Removes every entry whose key starts with `prefix`; returns how
    /// many were dropped. Used for parameterized key families such as
    /// `search_<term>_<limit>`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let before = inner.len();
        inner.retain(|k, _| !k.starts_with(prefix));
        before - inner.len()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for TimedCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_valid_until_ttl_elapses() {
        let cache: TimedCache<u32> = TimedCache::new();
        cache.set("k", 7, Duration::from_secs(300));
        assert!(cache.is_valid("k"));
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.is_valid("k"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.is_valid("k"));
        // Expired entries stay readable until overwritten.
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_expiry() {
        let cache: TimedCache<u32> = TimedCache::new();
        cache.set("k", 1, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(cache.is_valid("k"));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache: TimedCache<u32> = TimedCache::new();
        cache.set("search_fed_10", 1, Duration::from_secs(60));
        cache.set("search_fed_20", 2, Duration::from_secs(60));
        cache.set("vehicles", 3, Duration::from_secs(60));

        assert!(cache.invalidate("vehicles"));
        assert!(!cache.invalidate("vehicles"));
        assert_eq!(cache.invalidate_prefix("search_"), 2);
        assert!(cache.is_empty());

        cache.set("a", 1, Duration::from_secs(60));
        cache.clear();
        assert_eq!(cache.get("a"), None);
    }

    #[tokio::test]
    async fn missing_key_is_invalid() {
        let cache: TimedCache<u32> = TimedCache::new();
        assert!(!cache.is_valid("nope"));
        assert_eq!(cache.get("nope"), None);
    }
}
