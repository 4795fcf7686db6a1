// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::hash::Hash;

use lru::LruCache;

/// Trait for values that know their own size
pub trait SizedItem {
    #[must_use]
    fn size_bytes(&self) -> usize;
}

/// Count and byte bounds for a cache. Zero disables that bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl CacheLimits {
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self { max_entries, max_bytes }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0, 0)
    }

    fn entries_exceeded(&self, len: usize) -> bool {
        self.max_entries != 0 && len > self.max_entries
    }

    fn bytes_exceeded(&self, bytes: usize) -> bool {
        self.max_bytes != 0 && bytes > self.max_bytes
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Current number of entries
    pub entries: usize,
    /// Current size of all entries in bytes
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within limits (explicit removals not counted)
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0)
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Least-recently-used map bounded by entry count and total byte size.
///
/// `get` and `put` both count as a use. Entries that were never read after
/// insertion therefore leave in insertion order. A value larger than the
/// whole byte budget is refused rather than flushing everything else.
///
/// Not synchronized; owners wrap it in a lock.
pub struct BoundedLru<K: Hash + Eq, V: SizedItem> {
    entries: LruCache<K, V>,
    limits: CacheLimits,
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Hash + Eq, V: SizedItem> BoundedLru<K, V> {
    #[must_use]
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            entries: LruCache::unbounded(),
            limits,
            bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up and promote an entry.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look up without promoting or touching hit counters.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.peek(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Insert or replace, returning whatever had to leave to stay in bounds.
    ///
    /// If `value` alone exceeds the byte budget it is returned as the only
    /// eviction and the cache is left unchanged.
    pub fn put(&mut self, key: K, value: V) -> Vec<(K, V)> {
        if self.limits.bytes_exceeded(value.size_bytes()) {
            self.evictions += 1;
            return vec![(key, value)];
        }

        self.bytes += value.size_bytes();
        if let Some((_, replaced)) = self.entries.push(key, value) {
            self.bytes -= replaced.size_bytes();
        }
        self.enforce_limits()
    }

    /// Remove a single entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.pop(key)?;
        self.bytes -= value.size_bytes();
        Some(value)
    }

    /// Drop everything, returning `(entries, bytes)` released.
    pub fn clear(&mut self) -> (usize, usize) {
        let released = (self.entries.len(), self.bytes);
        self.entries.clear();
        self.bytes = 0;
        released
    }

    /// Change the bounds, evicting immediately if the cache is now over.
    pub fn set_limits(&mut self, limits: CacheLimits) -> Vec<(K, V)> {
        self.limits = limits;
        self.enforce_limits()
    }

    #[must_use]
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn enforce_limits(&mut self) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        while self.limits.entries_exceeded(self.entries.len()) || self.limits.bytes_exceeded(self.bytes) {
            let Some((key, value)) = self.entries.pop_lru() else {
                break;
            };
            self.bytes -= value.size_bytes();
            self.evictions += 1;
            evicted.push((key, value));
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Blob(usize);

    impl SizedItem for Blob {
        fn size_bytes(&self) -> usize {
            self.0
        }
    }

    fn keys(evicted: &[(&'static str, Blob)]) -> Vec<&'static str> {
        evicted.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_count_bound_evicts_oldest_insert() {
        let mut cache = BoundedLru::new(CacheLimits::new(2, 0));
        assert!(cache.put("a", Blob(1)).is_empty());
        assert!(cache.put("b", Blob(1)).is_empty());
        let evicted = cache.put("c", Blob(1));
        assert_eq!(keys(&evicted), vec!["a"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_promotes() {
        let mut cache = BoundedLru::new(CacheLimits::new(2, 0));
        cache.put("a", Blob(1));
        cache.put("b", Blob(1));
        assert!(cache.get(&"a").is_some());
        let evicted = cache.put("c", Blob(1));
        assert_eq!(keys(&evicted), vec!["b"]);
        assert!(cache.contains(&"a"));
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = BoundedLru::new(CacheLimits::new(2, 0));
        cache.put("a", Blob(1));
        cache.put("b", Blob(1));
        assert!(cache.peek(&"a").is_some());
        let evicted = cache.put("c", Blob(1));
        assert_eq!(keys(&evicted), vec!["a"]);
    }

    #[test]
    fn test_byte_bound_evicts_until_under_budget() {
        let mut cache = BoundedLru::new(CacheLimits::new(0, 10));
        cache.put("a", Blob(4));
        cache.put("b", Blob(4));
        let evicted = cache.put("c", Blob(6));
        assert_eq!(keys(&evicted), vec!["a", "b"]);
        assert_eq!(cache.size_bytes(), 6);
    }

    #[test]
    fn test_oversized_value_is_refused() {
        let mut cache = BoundedLru::new(CacheLimits::new(0, 10));
        cache.put("a", Blob(4));
        let evicted = cache.put("huge", Blob(11));
        assert_eq!(keys(&evicted), vec!["huge"]);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"huge"));
    }

    #[test]
    fn test_replace_adjusts_bytes() {
        let mut cache = BoundedLru::new(CacheLimits::unbounded());
        cache.put("a", Blob(4));
        cache.put("a", Blob(7));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 7);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = BoundedLru::new(CacheLimits::unbounded());
        cache.put("a", Blob(4));
        cache.put("b", Blob(5));
        assert_eq!(cache.remove(&"a"), Some(Blob(4)));
        assert_eq!(cache.remove(&"a"), None);
        assert_eq!(cache.clear(), (1, 5));
        assert_eq!(cache.clear(), (0, 0));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shrinking_limits_evicts() {
        let mut cache = BoundedLru::new(CacheLimits::unbounded());
        for key in ["a", "b", "c", "d"] {
            cache.put(key, Blob(1));
        }
        let evicted = cache.set_limits(CacheLimits::new(1, 0));
        assert_eq!(keys(&evicted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let mut cache = BoundedLru::new(CacheLimits::new(1, 0));
        cache.put("a", Blob(3));
        cache.get(&"a");
        cache.get(&"z");
        cache.put("b", Blob(2));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.bytes, 2);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
