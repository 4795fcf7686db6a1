// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded cache of decoded avatars, keyed by image reference.
//!
//! Keyed by the reference rather than the identity key so a contact photo
//! shared by several keys is decoded once.

use parking_lot::Mutex;
use tracing::debug;

use crate::eviction::{BoundedLru, CacheLimits, CacheStats, SizedItem};
use crate::identity::{Image, ImageRef};

const CACHE_LABEL: &str = "avatar";

impl SizedItem for Image {
    fn size_bytes(&self) -> usize {
        Image::size_bytes(self)
    }
}

pub struct AvatarCache {
    inner: Mutex<BoundedLru<ImageRef, Image>>,
}

impl AvatarCache {
    #[must_use]
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            inner: Mutex::new(BoundedLru::new(limits)),
        }
    }

    #[must_use]
    pub fn get(&self, image: &ImageRef) -> Option<Image> {
        let hit = self.inner.lock().get(image).cloned();
        crate::metrics::record_cache_lookup(CACHE_LABEL, hit.is_some());
        hit
    }

    pub fn put(&self, image: ImageRef, decoded: Image) {
        let (evicted, entries, bytes) = {
            let mut inner = self.inner.lock();
            let evicted = inner.put(image, decoded);
            (evicted, inner.len(), inner.size_bytes())
        };
        if !evicted.is_empty() {
            let evicted_bytes: usize = evicted.iter().map(|(_, i)| i.size_bytes()).sum();
            crate::metrics::record_eviction(CACHE_LABEL, "capacity", evicted.len(), evicted_bytes);
        }
        crate::metrics::set_cache_size(CACHE_LABEL, entries, bytes);
    }

    /// Drop every avatar (low memory).
    pub fn clear(&self) {
        let (count, bytes) = self.inner.lock().clear();
        if count > 0 {
            debug!(count, bytes, "Avatar cache cleared");
            crate::metrics::record_eviction(CACHE_LABEL, "pressure", count, bytes);
        }
        crate::metrics::set_cache_size(CACHE_LABEL, 0, 0);
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
