// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared cache of decoded cell payloads.
//!
//! A pure storage/eviction structure: it never loads anything itself and
//! never blocks on I/O. Population is the lifecycle controller's job.
//!
//! # Example
//!
//! ```
//! use conversation_core::{CacheLimits, CellMediaCache, CellMediaEntry, ContentId};
//!
//! let cache = CellMediaCache::new(CacheLimits::new(2, 0));
//! let id = ContentId::new("attachment-1");
//!
//! cache.put(id.clone(), CellMediaEntry::new(vec![0u8; 16]));
//! assert!(cache.get(&id).is_some());
//!
//! cache.evict_all();
//! assert!(cache.get(&id).is_none());
//! ```

use parking_lot::Mutex;
use tracing::debug;

use super::{CellMediaEntry, ContentId};
use crate::eviction::{BoundedLru, CacheLimits, CacheStats, SizedItem};

const CACHE_LABEL: &str = "media";

/// Bounded LRU of [`CellMediaEntry`] keyed by [`ContentId`].
///
/// All operations take one short lock; readers get a clone of the entry
/// (an `Arc` bump), so a read never observes a half-written entry.
pub struct CellMediaCache {
    inner: Mutex<BoundedLru<ContentId, CellMediaEntry>>,
}

impl CellMediaCache {
    #[must_use]
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            inner: Mutex::new(BoundedLru::new(limits)),
        }
    }

    /// Cached entry for `content`, promoting it in LRU order.
    #[must_use]
    pub fn get(&self, content: &ContentId) -> Option<CellMediaEntry> {
        let entry = self.inner.lock().get(content).cloned();
        crate::metrics::record_cache_lookup(CACHE_LABEL, entry.is_some());
        entry
    }

    #[must_use]
    pub fn contains(&self, content: &ContentId) -> bool {
        self.inner.lock().contains(content)
    }

    /// Insert or replace, evicting least-recently-used entries if over budget.
    pub fn put(&self, content: ContentId, entry: CellMediaEntry) {
        let (evicted, entries, bytes) = {
            let mut inner = self.inner.lock();
            let evicted = inner.put(content, entry);
            (evicted, inner.len(), inner.size_bytes())
        };

        if !evicted.is_empty() {
            let evicted_bytes: usize = evicted.iter().map(|(_, e)| e.size_bytes()).sum();
            debug!(count = evicted.len(), bytes = evicted_bytes, "Media cache over budget, evicted LRU entries");
            crate::metrics::record_eviction(CACHE_LABEL, "capacity", evicted.len(), evicted_bytes);
        }
        crate::metrics::set_cache_size(CACHE_LABEL, entries, bytes);
    }

    /// Drop one entry, e.g. because its source content changed.
    pub fn invalidate(&self, content: &ContentId) -> Option<CellMediaEntry> {
        let (removed, entries, bytes) = {
            let mut inner = self.inner.lock();
            let removed = inner.remove(content);
            (removed, inner.len(), inner.size_bytes())
        };
        if removed.is_some() {
            crate::metrics::set_cache_size(CACHE_LABEL, entries, bytes);
        }
        removed
    }

    /// Drop everything. Idempotent.
    pub fn evict_all(&self) {
        let (count, bytes) = self.inner.lock().clear();
        if count > 0 {
            debug!(count, bytes, "Media cache cleared");
            crate::metrics::record_eviction(CACHE_LABEL, "pressure", count, bytes);
        }
        crate::metrics::set_cache_size(CACHE_LABEL, 0, 0);
    }

    /// Apply new bounds, evicting immediately if needed.
    pub fn set_limits(&self, limits: CacheLimits) {
        let evicted = self.inner.lock().set_limits(limits);
        if !evicted.is_empty() {
            let bytes: usize = evicted.iter().map(|(_, e)| e.size_bytes()).sum();
            crate::metrics::record_eviction(CACHE_LABEL, "resize", evicted.len(), bytes);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}
