//! Cell media: the shared decoded-payload cache and the per-cell lifecycle
//! that decides when payloads are loaded and released.
//!
//! ```text
//!   visibility / pressure signals
//!               │
//!               ▼
//!   ┌───────────────────────────┐   load()    ┌──────────────┐
//!   │ CellLifecycleController   │ ──────────▶ │ MediaLoader  │
//!   │ Prefetched → Loading      │ ◀────────── │ (external)   │
//!   │ → Loaded → Evicted        │             └──────────────┘
//!   └───────────────────────────┘
//!               │ get / put / invalidate / evict_all
//!               ▼
//!   ┌───────────────────────────┐
//!   │ CellMediaCache (LRU)      │
//!   └───────────────────────────┘
//! ```

pub mod cache;
pub mod lifecycle;

use std::fmt;
use std::sync::Arc;

use crate::eviction::SizedItem;

pub use cache::CellMediaCache;
pub use lifecycle::{CellLifecycleController, CellState, CellTransition};

/// Stable identity of a cell's content (e.g. an attachment id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a cell in the presentation layer.
///
/// Cells are referred to by id only; nothing here keeps the presentation
/// layer alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell-{}", self.0)
    }
}

/// Decoded payload for one piece of content. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMediaEntry {
    bytes: Arc<[u8]>,
}

impl CellMediaEntry {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SizedItem for CellMediaEntry {
    fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Visibility change reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub cell: CellId,
    pub visible: bool,
}
