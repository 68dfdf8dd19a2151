//! Explicit TTL cache abstraction.
//!
//! A value owned by whichever component needs caching, never a
//! process-wide singleton. A zero TTL disables the cache entirely, so
//! components can hold one unconditionally and let configuration decide.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheSlot<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheSlot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Fresh cached value for `key`, if any. Expired entries are removed
    /// on access.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(slot) if slot.inserted_at.elapsed() < self.ttl => Some(slot.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            CacheSlot {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().unwrap().remove(key);
    }

    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, slot| slot.inserted_at.elapsed() < self.ttl);
    }

    /// Return the cached value for `key` or run `loader` and cache its
    /// result. Concurrent misses may load twice; the last finisher's
    /// value stays cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = loader().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::ZERO);
        let mut loads = 0;
        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_load("k", || {
                    loads += 1;
                    async { Ok(7) }
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(loads, 3);
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_loader() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let mut loads = 0;
        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_load("k", || {
                    loads += 1;
                    async { Ok(7) }
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(loads, 1);
    }

    #[test]
    fn test_entries_expire() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("k", 7);
        assert_eq!(cache.get(&"k"), Some(7));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 7);
        cache.invalidate(&"k");
        assert_eq!(cache.get(&"k"), None);
    }

    #[tokio::test]
    async fn test_loader_errors_are_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let failed: Result<u32, &str> = cache.get_or_load("k", || async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));

        let ok: Result<u32, &str> = cache.get_or_load("k", || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }
}
