//! In-memory memoization of provider responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::query::Fingerprint;
use crate::Frame;

#[derive(Debug, Clone)]
struct CacheEntry {
    frame: Frame,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Expiry is exclusive: an entry whose age has reached its TTL is
    /// already expired (`age >= ttl` means absent).
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) < self.ttl
    }
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl CacheInner {
    fn new(default_ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            default_ttl,
        }
    }

    fn get(&self, key: &str) -> Option<Frame> {
        let now = Instant::now();
        self.map.get(key).and_then(|entry| {
            if entry.is_fresh(now) {
                Some(entry.frame.clone())
            } else {
                None
            }
        })
    }

    fn put(&mut self, key: String, frame: Frame, ttl_override: Option<Duration>) {
        let ttl = ttl_override.unwrap_or(self.default_ttl);
        // Expired entries are silently overwritten here.
        self.map.insert(
            key,
            CacheEntry {
                frame,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.is_fresh(now));
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Thread-safe response cache keyed by request fingerprint.
///
/// Each provider instance owns exactly one of these; entries are never
/// shared across providers.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(default_ttl))),
        }
    }

    /// Returns the cached frame for a fingerprint if present and not
    /// yet expired.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Frame> {
        let store = self.inner.read().await;
        store.get(fingerprint.as_str())
    }

    pub async fn put(&self, fingerprint: Fingerprint, frame: Frame, ttl_override: Option<Duration>) {
        let mut store = self.inner.write().await;
        store.put(fingerprint.as_str().to_owned(), frame, ttl_override);
    }

    pub async fn clear_expired(&self) {
        let mut store = self.inner.write().await;
        store.clear_expired();
    }

    /// Evicts everything immediately. Does not affect pacing state.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.clear();
    }

    /// Entry count, including entries past their TTL that have not yet
    /// been swept.
    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QuerySpec;
    use serde_json::json;

    fn frame(value: i64) -> Frame {
        Frame::new(vec![String::from("v")], vec![vec![json!(value)]]).expect("valid frame")
    }

    fn key(name: &str) -> Fingerprint {
        QuerySpec::new(name).fingerprint("test")
    }

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        assert!(cache.get(&key("a")).await.is_none());
        cache.put(key("a"), frame(1), None).await;
        assert_eq!(cache.get(&key("a")).await, Some(frame(1)));
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let cache = ResponseCache::new(Duration::from_millis(40));

        cache.put(key("a"), frame(1), None).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key("a")).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_never_returned() {
        // Exclusive expiry: age >= ttl is expired, so ttl zero means
        // the entry is dead on arrival.
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put(key("a"), frame(1), Some(Duration::ZERO)).await;
        assert!(cache.get(&key("a")).await.is_none());
    }

    #[tokio::test]
    async fn overwrite_replaces_payload() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put(key("a"), frame(1), None).await;
        cache.put(key("a"), frame(2), None).await;
        assert_eq!(cache.get(&key("a")).await, Some(frame(2)));
    }

    #[tokio::test]
    async fn clear_evicts_everything() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put(key("a"), frame(1), None).await;
        cache.put(key("b"), frame(2), None).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clear_expired_keeps_fresh_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put(key("old"), frame(1), Some(Duration::from_millis(30))).await;
        cache.put(key("new"), frame(2), None).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        cache.clear_expired().await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&key("new")).await, Some(frame(2)));
    }
}
