//! LRU cache for embedding results.
//!
//! Avoids re-computing embeddings for repeated query text.
//! Default: 1000 entries, 1-hour TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Cached embedding entry with timestamp.
struct CacheEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache for embeddings.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    order: Vec<String>,
    max_size: usize,
    ttl: Duration,
}

impl EmbeddingCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: Vec::with_capacity(max_size),
                max_size,
                ttl,
            }),
        }
    }

    /// Create a cache with default settings (1000 entries, 1hr TTL).
    pub fn default_cache() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    /// Get a cached embedding. Returns None on miss or expired entry.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();

        let expired = inner
            .entries
            .get(text)
            .map(|e| e.inserted_at.elapsed() >= inner.ttl);

        match expired {
            Some(false) => {
                let embedding = inner.entries.get(text).unwrap().embedding.clone();
                if let Some(pos) = inner.order.iter().position(|k| k == text) {
                    let key = inner.order.remove(pos);
                    inner.order.push(key);
                }
                Some(embedding)
            }
            Some(true) => {
                let key = text.to_string();
                inner.entries.remove(&key);
                inner.order.retain(|k| k != &key);
                None
            }
            None => None,
        }
    }

    /// Insert an embedding into the cache.
    pub fn put(&self, text: String, embedding: Vec<f32>) {
        let mut inner = self.inner.lock();

        // If already present, update and move to end
        if inner.entries.contains_key(&text) {
            inner.entries.insert(
                text.clone(),
                CacheEntry {
                    embedding,
                    inserted_at: Instant::now(),
                },
            );
            inner.order.retain(|k| k != &text);
            inner.order.push(text);
            return;
        }

        // Evict oldest if at capacity
        while inner.entries.len() >= inner.max_size && !inner.order.is_empty() {
            let oldest = inner.order.remove(0);
            inner.entries.remove(&oldest);
        }

        inner.order.push(text.clone());
        inner.entries.insert(
            text,
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(3600));
        assert!(cache.get("hello").is_none());

        cache.put("hello".into(), vec![1.0, 2.0, 3.0]);
        let hit = cache.get("hello");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(3600));
        cache.put("a".into(), vec![1.0]);
        cache.put("b".into(), vec![2.0]);
        assert_eq!(cache.len(), 2);

        // Adding third should evict "a"
        cache.put("c".into(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let cache = EmbeddingCache::new(10, Duration::from_millis(1));
        cache.put("ephemeral".into(), vec![1.0]);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("ephemeral").is_none());
    }
}
