//! In-memory store with TTL expiry and glob key enumeration

use super::glob::glob_match;
use super::{KvStore, StoreFuture};
use crate::clock::{Clock, SystemClock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// Unix seconds at which the entry stops being visible
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory key-value store
///
/// Expired entries are invisible to every read and are dropped lazily on
/// the next write to the same key, or in bulk by `evict_expired()`.
#[derive(Debug)]
pub struct InMemoryStore<C: Clock = SystemClock> {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    clock: C,
}

impl InMemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Clone for InMemoryStore<C> {
    fn clone(&self) -> Self {
        InMemoryStore {
            data: Arc::clone(&self.data),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> InMemoryStore<C> {
    /// Create a store whose TTLs are measured against `clock`
    pub fn with_clock(clock: C) -> Self {
        InMemoryStore {
            data: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now_secs();
        self.data.read().values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a live key in seconds, `None` if absent or persistent
    pub fn ttl_secs(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_secs();
        let data = self.data.read();
        let entry = data.get(key).filter(|e| !e.is_expired(now))?;
        entry.expires_at.map(|at| at - now)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_secs();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, e| !e.is_expired(now));
        before - data.len()
    }

    fn set_if_absent_sync(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let now = self.clock.now_secs();
        let mut data = self.data.write();
        if data.get(key).is_some_and(|e| !e.is_expired(now)) {
            return false;
        }
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now.saturating_add(ttl.as_secs())),
            },
        );
        true
    }

    fn expire_sync(&self, key: &str, ttl: Duration) -> bool {
        let now = self.clock.now_secs();
        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now.saturating_add(ttl.as_secs()));
                true
            }
            _ => false,
        }
    }

    fn append_sync(&self, key: &str, value: &str) -> usize {
        let now = self.clock.now_secs();
        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.value.push_str(value);
                entry.value.len()
            }
            // Missing or expired: APPEND creates a fresh persistent key
            _ => {
                data.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: None,
                    },
                );
                value.len()
            }
        }
    }

    fn keys_sync(&self, pattern: &str) -> Vec<String> {
        let now = self.clock.now_secs();
        let data = self.data.read();
        let mut keys: Vec<String> = data
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && glob_match(k, pattern))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn get_sync(&self, key: &str) -> Option<String> {
        let now = self.clock.now_secs();
        self.data
            .read()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone())
    }
}

impl<C: Clock> KvStore for InMemoryStore<C> {
    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.set_if_absent_sync(key, value, ttl)) })
    }

    fn append<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move { Ok(self.append_sync(key, value)) })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.expire_sync(key, ttl)) })
    }

    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(self.keys_sync(pattern)) })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.get_sync(key)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;

    const TTL: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn test_set_if_absent_first_writer_wins() {
        let store = InMemoryStore::new();

        assert!(store.set_if_absent("k", "first", TTL).await.unwrap());
        assert!(!store.set_if_absent("k", "second", TTL).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_append_extends_value() {
        let store = InMemoryStore::new();

        store.set_if_absent("k", "h", TTL).await.unwrap();
        assert_eq!(store.append("k", "|1").await.unwrap(), 3);
        assert_eq!(store.append("k", "|2").await.unwrap(), 5);
        assert_eq!(store.get("k").await.unwrap(), Some("h|1|2".to_string()));
    }

    #[tokio::test]
    async fn test_append_keeps_ttl() {
        let clock = SimulatedClock::new(1000);
        let store = InMemoryStore::with_clock(clock.clone());

        store.set_if_absent("k", "h", TTL).await.unwrap();
        clock.advance_secs(30);
        store.append("k", "|1").await.unwrap();
        assert_eq!(store.ttl_secs("k"), Some(90));
    }

    #[tokio::test]
    async fn test_append_to_missing_key_creates_it() {
        let store = InMemoryStore::new();

        assert_eq!(store.append("k", "|1").await.unwrap(), 2);
        assert_eq!(store.ttl_secs("k"), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expire_sets_ttl_on_live_key() {
        let clock = SimulatedClock::new(1000);
        let store = InMemoryStore::with_clock(clock.clone());

        store.append("k", "|1").await.unwrap();
        assert!(store.expire("k", TTL).await.unwrap());
        assert_eq!(store.ttl_secs("k"), Some(120));

        clock.advance_secs(120);
        assert!(!store.expire("k", TTL).await.unwrap());
        assert!(!store.expire("missing", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_huge_ttl_saturates() {
        let clock = SimulatedClock::new(1000);
        let store = InMemoryStore::with_clock(clock.clone());

        assert!(store.set_if_absent("k", "v", Duration::from_secs(u64::MAX)).await.unwrap());
        assert_eq!(store.ttl_secs("k"), Some(u64::MAX - 1000));
        assert!(store.get("k").await.unwrap().is_some());

        assert!(store.expire("k", Duration::MAX).await.unwrap());
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expiry() {
        let clock = SimulatedClock::new(1000);
        let store = InMemoryStore::with_clock(clock.clone());

        store.set_if_absent("k", "v", TTL).await.unwrap();
        clock.advance_secs(119);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance_secs(1);
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.keys("*").await.unwrap().is_empty());

        // An expired key can be created again
        assert!(store.set_if_absent("k", "v2", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let clock = SimulatedClock::new(0);
        let store = InMemoryStore::with_clock(clock.clone());

        store.set_if_absent("a", "v", Duration::from_secs(10)).await.unwrap();
        store.set_if_absent("b", "v", Duration::from_secs(100)).await.unwrap();
        clock.advance_secs(50);

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_pattern() {
        let store = InMemoryStore::new();

        store.set_if_absent("acc_60_b", "v", TTL).await.unwrap();
        store.set_if_absent("acc_60_a", "v", TTL).await.unwrap();
        store.set_if_absent("acc_120_a", "v", TTL).await.unwrap();

        assert_eq!(
            store.keys("acc_60_*").await.unwrap(),
            vec!["acc_60_a".to_string(), "acc_60_b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = InMemoryStore::new();
        let other = store.clone();

        store.set_if_absent("k", "v", TTL).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some("v".to_string()));
    }
}
