//! Eviction policy shared by the avatar cache and the cell media cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  lru.rs         - Bounded least-recently-used map            │
//! │  └─ BoundedLru: count + byte bounds, LRU order               │
//! │  └─ CacheLimits: configurable bounds (0 = unbounded)         │
//! │  └─ SizedItem: values report their own size                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both caches evict deterministically: on insert when over a bound, and on
//! an explicit pressure signal. Nothing evicts in the background.

pub mod lru;

pub use self::lru::{BoundedLru, CacheLimits, CacheStats, SizedItem};
