//! In-Memory Expiring Cache
//!
//! Thread-safe key/value store with one uniform TTL per cache instance.
//! Menggunakan DashMap untuk concurrent access tanpa global lock.
//!
//! Features:
//! - Entry yang expired tidak pernah terlihat oleh `get`, walaupun belum di-sweep
//! - Background sweeper terpisah dari traffic
//! - Last writer wins untuk key yang sama
//! - HIT/MISS counters untuk /stats

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Cache entry dengan timestamp untuk TTL validation
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    stored_at_wall: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// A live entry returned by [`ExpiringCache::lookup`]
#[derive(Clone, Debug)]
pub struct CacheHit<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
    /// Sisa waktu sebelum expired
    pub remaining: Duration,
}

pub struct ExpiringCache<V> {
    name: &'static str,
    store: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> ExpiringCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            store: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).map(|hit| hit.value)
    }

    /// Get with the time the value was stored
    pub fn lookup(&self, key: &str) -> Option<CacheHit<V>> {
        let live = match self.store.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => Some(CacheHit {
                value: entry.value.clone(),
                stored_at: entry.stored_at_wall,
                remaining: self.ttl.saturating_sub(entry.stored_at.elapsed()),
            }),
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS [{}]: {}", self.name, key);
                return None;
            }
        };

        match live {
            Some(hit) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "✅ CACHE HIT [{}]: {} (TTL: {}s remaining)",
                    self.name,
                    key,
                    hit.remaining.as_secs()
                );
                Some(hit)
            }
            None => {
                // Re-check under the shard write lock so a fresh concurrent set survives
                let ttl = self.ttl;
                self.store.remove_if(key, |_, entry| entry.is_expired(ttl));
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS (expired) [{}]: {}", self.name, key);
                None
            }
        }
    }

    /// Overwrites any existing entry
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        debug!("💾 CACHE SET [{}]: {} (TTL: {}s)", self.name, key, self.ttl.as_secs());
        self.store.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                stored_at_wall: Utc::now(),
            },
        );
    }

    /// Bersihkan semua entry yang expired
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        let ttl = self.ttl;
        self.store.retain(|_, entry| !entry.is_expired(ttl));
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            name: self.name,
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }

    /// Background task: sweep expired entries every `interval`
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    info!("🧹 Cache cleanup [{}]: {} expired entries removed", cache.name, removed);
                }
            }
        })
    }
}

/// Statistik cache untuk monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_set_get() {
        let cache = ExpiringCache::new("test", Duration::from_secs(60));
        cache.set("contract:base:0xabc", 42u32);
        assert_eq!(cache.get("contract:base:0xabc"), Some(42));
        assert!(cache.lookup("contract:base:0xabc").unwrap().remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_cache_miss() {
        let cache: ExpiringCache<u32> = ExpiringCache::new("test", Duration::from_secs(60));
        assert!(cache.get("token:base:0x1234").is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ExpiringCache::new("test", Duration::from_secs(60));
        cache.set("k", "first".to_string());
        cache.set("k", "second".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_invisible_before_sweep() {
        let cache = ExpiringCache::new("test", Duration::from_millis(20));
        cache.set("k", 1u8);
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("k").is_none());
        // Lazy removal already dropped it
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let cache = ExpiringCache::new("test", Duration::from_millis(20));
        cache.set("a", 1u8);
        cache.set("b", 2u8);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_stats() {
        let cache = ExpiringCache::new("test", Duration::from_secs(60));
        cache.set("0xtest", 1u8);
        cache.get("0xtest"); // HIT
        cache.get("0xnonexistent"); // MISS

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_one_whole_value() {
        let cache = Arc::new(ExpiringCache::new("test", Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.set("shared", vec![i; 64]);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let value = cache.get("shared").unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.iter().all(|v| *v == value[0]));
    }

    #[tokio::test]
    async fn test_sweeper_removes_without_traffic() {
        let cache = Arc::new(ExpiringCache::new("test", Duration::from_millis(10)));
        cache.set("k", 1u8);
        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.is_empty());
        handle.abort();
    }
}
