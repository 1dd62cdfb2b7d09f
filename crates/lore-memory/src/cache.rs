//! Bounded, recency-ordered content cache.
//!
//! Entries are bounded both by count and by total UTF-8 byte size. Mutations
//! take a `parking_lot::Mutex` around the LRU list; counters live in atomics
//! so statistics can be read while another thread holds the lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lore_core::config::CacheConfig;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    pub bytes: usize,
    pub max_count: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0.0 before the first lookup.
    pub hit_rate: f64,
}

pub struct ContentCache {
    entries: Mutex<LruCache<String, Arc<str>>>,
    max_count: usize,
    max_bytes: usize,
    count: AtomicUsize,
    bytes: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    /// Create a cache holding at most `max_count` entries (at least one) and
    /// about `max_bytes` bytes.
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_count: max_count.max(1),
            max_bytes,
            count: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.max_bytes())
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        let found = self.entries.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Look up `key` without touching recency or hit counters.
    pub fn peek(&self, key: &str) -> Option<Arc<str>> {
        self.entries.lock().peek(key).cloned()
    }

    /// Mark `key` most recently used without counting a lookup. Returns
    /// whether it was cached.
    pub fn promote(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains(key) {
            entries.promote(key);
            true
        } else {
            false
        }
    }

    /// Insert or replace `key`, evicting least recently used entries until
    /// the new entry fits.
    ///
    /// An entry larger than the byte budget is still accepted; it simply
    /// evicts everything else.
    pub fn put(&self, key: impl Into<String>, content: impl Into<Arc<str>>) {
        let key = key.into();
        let content = content.into();
        let size = content.len();

        let mut entries = self.entries.lock();
        let mut total = self.bytes.load(Ordering::Relaxed);

        if let Some(old) = entries.pop(&key) {
            total -= old.len();
        }

        while !entries.is_empty()
            && (entries.len() >= self.max_count || total + size > self.max_bytes)
        {
            match entries.pop_lru() {
                Some((evicted, old)) => {
                    total -= old.len();
                    debug!(key = %evicted, bytes = old.len(), "cache eviction");
                }
                None => break,
            }
        }

        entries.put(key, content);
        total += size;

        self.bytes.store(total, Ordering::Relaxed);
        self.count.store(entries.len(), Ordering::Relaxed);
    }

    /// Drop `key`. Returns whether it was cached.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.pop(key) {
            Some(old) => {
                self.bytes.fetch_sub(old.len(), Ordering::Relaxed);
                self.count.store(entries.len(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Hit and miss counters are kept.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.bytes.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }

    /// Whether `key` is cached. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total UTF-8 bytes currently held.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            count: self.len(),
            bytes: self.bytes(),
            max_count: self.max_count,
            max_bytes: self.max_bytes,
            hits,
            misses,
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("stats", &self.stats())
            .finish()
    }
}
