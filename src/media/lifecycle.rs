// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-cell media lifecycle.
//!
//! Cells are prefetched before they scroll on screen, but their media is only
//! decoded while they are visible and is dropped the moment they are not.
//!
//! # State machine
//!
//! ```text
//!                 visible                  load ok
//!   Prefetched ───────────▶ Loading ───────────────▶ Loaded
//!                            ▲   │                     │
//!          visible           │   │ hidden / pressure   │ hidden / pressure
//!   Evicted ─────────────────┘   ▼                     ▼
//!      ▲◀──────────────────── Evicted ◀────────────────┘
//! ```
//!
//! A failed load leaves the cell in `Loading` until it is retried or hidden.
//!
//! # Concurrency
//!
//! Each cell is guarded by its own map slot, so signals for one cell apply in
//! order and different cells never contend. Loads run as spawned tasks and
//! carry the generation they were started for: a result arriving after the
//! cell moved on is discarded, never inserted. Release paths hold no slot
//! lock while touching the shared cache or the referent counts; an accepted
//! load writes the cache under its slot lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{CellId, CellMediaCache, CellMediaEntry, ContentId};
use crate::pressure::PressureSignal;
use crate::sources::traits::{MediaLoader, SourceError};

/// Lifecycle state of one cell's expensive content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Not (yet) visible, nothing loaded
    Prefetched,
    /// Visible, content requested but not ready
    Loading,
    /// Visible, content held
    Loaded,
    /// Content released after being requested or held
    Evicted,
}

impl CellState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefetched => "prefetched",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Evicted => "evicted",
        }
    }
}

impl std::fmt::Display for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A state change, broadcast so the presentation layer can re-render by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellTransition {
    pub cell: CellId,
    pub from: CellState,
    pub to: CellState,
}

#[derive(Debug)]
struct CellSlot {
    content: Option<ContentId>,
    visible: bool,
    state: CellState,
    payload: Option<CellMediaEntry>,
    /// Generation of the load this slot is waiting on
    generation: u64,
    load: Option<AbortHandle>,
    /// Last load for this generation failed
    failed: bool,
}

impl CellSlot {
    fn new(content: Option<ContentId>) -> Self {
        Self {
            content,
            visible: false,
            state: CellState::Prefetched,
            payload: None,
            generation: 0,
            load: None,
            failed: false,
        }
    }
}

struct Inner {
    cells: DashMap<CellId, CellSlot>,
    /// Loaded cells per content id
    referents: DashMap<ContentId, usize>,
    cache: Arc<CellMediaCache>,
    loader: Arc<dyn MediaLoader>,
    evict_unreferenced: bool,
    transitions: broadcast::Sender<CellTransition>,
    next_generation: AtomicU64,
}

/// Drives load/unload of cell media against the shared [`CellMediaCache`].
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CellLifecycleController {
    inner: Arc<Inner>,
}

impl CellLifecycleController {
    /// Create a controller.
    ///
    /// With `evict_unreferenced`, a cache entry is dropped as soon as the
    /// last loaded cell showing it lets go; otherwise it stays until LRU or a
    /// pressure signal removes it.
    pub fn new(
        cache: Arc<CellMediaCache>,
        loader: Arc<dyn MediaLoader>,
        evict_unreferenced: bool,
        event_capacity: usize,
    ) -> Self {
        let (transitions, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                cells: DashMap::new(),
                referents: DashMap::new(),
                cache,
                loader,
                evict_unreferenced,
                transitions,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CellTransition> {
        self.inner.transitions.subscribe()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CellMediaCache> {
        &self.inner.cache
    }

    /// Associate `cell` with the content of its view item (`None` for cells
    /// without expensive content).
    ///
    /// Rebinding a cell to different content releases what it held and, if
    /// the cell is visible, requests the new content right away.
    pub fn bind(&self, cell: CellId, content: Option<ContentId>) {
        let mut events = Vec::new();
        let (released, pending) = {
            let mut slot = self.inner.cells.entry(cell).or_insert_with(|| CellSlot::new(None));
            if slot.content == content {
                return;
            }
            let released = self.inner.release_slot(cell, &mut slot, &mut events);
            slot.content = content;
            let pending = if slot.visible {
                self.inner.begin_load(cell, &mut slot, &mut events)
            } else {
                None
            };
            (released, pending)
        };
        self.inner.finish_signal(cell, events, released, pending);
    }

    /// Forget a cell entirely (e.g. its view item was deleted).
    pub fn unbind(&self, cell: CellId) {
        let Some((_, mut slot)) = self.inner.cells.remove(&cell) else {
            return;
        };
        let mut events = Vec::new();
        let released = self.inner.release_slot(cell, &mut slot, &mut events);
        self.inner.finish_signal(cell, events, released, None);
    }

    /// Apply a visibility signal. Unknown cells are registered unbound.
    pub fn on_visibility_changed(&self, cell: CellId, visible: bool) {
        let mut events = Vec::new();
        let (released, pending) = {
            let mut slot = self.inner.cells.entry(cell).or_insert_with(|| CellSlot::new(None));
            slot.visible = visible;
            if visible {
                (None, self.inner.begin_load(cell, &mut slot, &mut events))
            } else {
                (self.inner.release_slot(cell, &mut slot, &mut events), None)
            }
        };
        self.inner.finish_signal(cell, events, released, pending);
    }

    /// Release every loading or loaded cell and empty the shared cache,
    /// regardless of visibility. Returns how many cells were evacuated.
    pub fn evacuate(&self, signal: PressureSignal) -> usize {
        let mut events = Vec::new();
        let mut released = Vec::new();
        for mut slot in self.inner.cells.iter_mut() {
            let cell = *slot.key();
            if let Some(content) = self.inner.release_slot(cell, slot.value_mut(), &mut events) {
                released.push(content);
            }
        }

        let evacuated = events.len();
        self.inner.emit(events);
        for content in &released {
            self.inner.release_ref(content);
        }
        self.inner.cache.evict_all();

        info!(signal = %signal, cells = evacuated, "Evacuated cell media");
        crate::metrics::record_pressure_signal(signal.as_str(), evacuated);
        evacuated
    }

    /// Re-request content for visible cells that were evacuated.
    pub fn reload_visible(&self) -> usize {
        let mut events = Vec::new();
        let mut pending = Vec::new();
        for mut slot in self.inner.cells.iter_mut() {
            let cell = *slot.key();
            if slot.visible {
                if let Some(load) = self.inner.begin_load(cell, slot.value_mut(), &mut events) {
                    pending.push((cell, load));
                }
            }
        }
        self.inner.emit(events);
        let count = pending.len();
        for (cell, (content, generation)) in pending {
            Inner::start_load(&self.inner, cell, content, generation);
        }
        count
    }

    /// Retry a cell whose load failed. Returns false if there was nothing to retry.
    pub fn retry_failed(&self, cell: CellId) -> bool {
        let pending = {
            let Some(mut slot) = self.inner.cells.get_mut(&cell) else {
                return false;
            };
            if slot.state != CellState::Loading || !slot.failed {
                return false;
            }
            let Some(content) = slot.content.clone() else {
                return false;
            };
            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            slot.generation = generation;
            slot.failed = false;
            (content, generation)
        };
        debug!(%cell, content = %pending.0, "Retrying media load");
        Inner::start_load(&self.inner, cell, pending.0, pending.1);
        true
    }

    /// Payload currently held by `cell`; `None` unless it is `Loaded`.
    #[must_use]
    pub fn content_for(&self, cell: CellId) -> Option<CellMediaEntry> {
        let slot = self.inner.cells.get(&cell)?;
        match slot.state {
            CellState::Loaded => slot.payload.clone(),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(&self, cell: CellId) -> Option<CellState> {
        self.inner.cells.get(&cell).map(|slot| slot.state)
    }

    /// Whether the last load for `cell` failed and is awaiting a retry.
    #[must_use]
    pub fn load_failed(&self, cell: CellId) -> bool {
        self.inner.cells.get(&cell).is_some_and(|slot| slot.failed)
    }

    /// Number of loaded cells currently showing `content`.
    #[must_use]
    pub fn referents(&self, content: &ContentId) -> usize {
        self.inner.referents.get(content).map(|c| *c).unwrap_or(0)
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.inner.cells.len()
    }

    /// Evacuate everything and forget all cells.
    pub fn shutdown(&self) {
        self.evacuate(PressureSignal::EnteredBackground);
        self.inner.cells.clear();
        self.inner.referents.clear();
    }
}

impl Inner {
    /// Move a cell that should show content into `Loading`.
    fn begin_load(
        &self,
        cell: CellId,
        slot: &mut CellSlot,
        events: &mut Vec<CellTransition>,
    ) -> Option<(ContentId, u64)> {
        if !matches!(slot.state, CellState::Prefetched | CellState::Evicted) {
            return None;
        }
        let content = slot.content.clone()?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        events.push(CellTransition {
            cell,
            from: slot.state,
            to: CellState::Loading,
        });
        slot.state = CellState::Loading;
        slot.generation = generation;
        slot.failed = false;
        Some((content, generation))
    }

    /// Drop whatever the cell holds or is waiting for.
    ///
    /// Returns the content whose reference must be released once the slot
    /// lock is gone.
    fn release_slot(
        &self,
        cell: CellId,
        slot: &mut CellSlot,
        events: &mut Vec<CellTransition>,
    ) -> Option<ContentId> {
        let from = slot.state;
        if !matches!(from, CellState::Loading | CellState::Loaded) {
            return None;
        }
        if let Some(load) = slot.load.take() {
            load.abort();
        }
        slot.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        slot.state = CellState::Evicted;
        slot.payload = None;
        slot.failed = false;
        events.push(CellTransition {
            cell,
            from,
            to: CellState::Evicted,
        });
        match from {
            CellState::Loaded => slot.content.clone(),
            _ => None,
        }
    }

    /// Emit, release and load once the slot lock is gone.
    fn finish_signal(
        self: &Arc<Self>,
        cell: CellId,
        events: Vec<CellTransition>,
        released: Option<ContentId>,
        pending: Option<(ContentId, u64)>,
    ) {
        self.emit(events);
        if let Some(content) = released {
            self.release_ref(&content);
        }
        if let Some((content, generation)) = pending {
            Self::start_load(self, cell, content, generation);
        }
    }

    /// Serve from the cache or spawn a load task.
    fn start_load(self: &Arc<Self>, cell: CellId, content: ContentId, generation: u64) {
        if let Some(entry) = self.cache.get(&content) {
            self.finish_load(cell, &content, generation, Ok(entry), true);
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            self.finish_load(
                cell,
                &content,
                generation,
                Err(SourceError::Unavailable("no async runtime for media load".into())),
                false,
            );
            return;
        };

        let task = Arc::clone(self);
        let task_content = content.clone();
        let handle = runtime.spawn(async move {
            let _timer = crate::metrics::LatencyTimer::new("media", "load");
            let result = task.loader.load(&task_content).await;
            task.finish_load(cell, &task_content, generation, result, false);
        });

        let superseded = match self.cells.get_mut(&cell) {
            Some(mut slot) if slot.generation == generation => {
                if slot.state == CellState::Loading && !slot.failed {
                    slot.load = Some(handle.abort_handle());
                }
                false
            }
            _ => true,
        };
        if superseded {
            handle.abort();
        }
    }

    fn finish_load(
        &self,
        cell: CellId,
        content: &ContentId,
        generation: u64,
        result: Result<CellMediaEntry, SourceError>,
        from_cache: bool,
    ) {
        match result {
            Ok(entry) => {
                // Count the reference before publishing Loaded so a racing
                // release can never drive the count below its true value.
                self.acquire_ref(content);
                // Lock order: cell slot, then cache. Only an accepted result
                // reaches the cache.
                let accepted = match self.cells.get_mut(&cell) {
                    Some(mut slot) if slot.generation == generation && slot.state == CellState::Loading => {
                        if !from_cache {
                            self.cache.put(content.clone(), entry.clone());
                        }
                        slot.state = CellState::Loaded;
                        slot.payload = Some(entry);
                        slot.load = None;
                        slot.failed = false;
                        true
                    }
                    _ => false,
                };

                if accepted {
                    self.emit(vec![CellTransition {
                        cell,
                        from: CellState::Loading,
                        to: CellState::Loaded,
                    }]);
                } else {
                    debug!(%cell, content = %content, "Discarding media load for a cell that moved on");
                    self.release_ref(content);
                }
            }
            Err(error) => {
                let waiting = match self.cells.get_mut(&cell) {
                    Some(mut slot) if slot.generation == generation && slot.state == CellState::Loading => {
                        slot.load = None;
                        slot.failed = true;
                        true
                    }
                    _ => false,
                };
                if waiting {
                    warn!(%cell, content = %content, error = %error, "Media load failed; cell stays loading until retried");
                    crate::metrics::record_error("media", "load", error_kind(&error));
                }
            }
        }
    }

    fn acquire_ref(&self, content: &ContentId) {
        *self.referents.entry(content.clone()).or_insert(0) += 1;
    }

    fn release_ref(&self, content: &ContentId) {
        let last = {
            let Some(mut count) = self.referents.get_mut(content) else {
                return;
            };
            *count = count.saturating_sub(1);
            *count == 0
        };
        if last {
            self.referents.remove_if(content, |_, count| *count == 0);
            if self.evict_unreferenced {
                self.cache.invalidate(content);
            }
        }
    }

    fn emit(&self, events: Vec<CellTransition>) {
        for event in events {
            crate::metrics::record_cell_transition(event.from.as_str(), event.to.as_str());
            // No subscribers is fine.
            let _ = self.transitions.send(event);
        }
    }
}

fn error_kind(error: &SourceError) -> &'static str {
    match error {
        SourceError::PermissionDenied => "permission_denied",
        SourceError::Unavailable(_) => "unavailable",
        SourceError::DecodeFailure { .. } => "decode",
        SourceError::MergeConflict { .. } => "merge_conflict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::CacheLimits;
    use crate::sources::memory::InMemoryMediaLoader;
    use std::time::Duration;

    fn content(id: &str) -> ContentId {
        ContentId::new(id)
    }

    fn setup(loader: InMemoryMediaLoader) -> (CellLifecycleController, Arc<InMemoryMediaLoader>) {
        setup_with(loader, true)
    }

    fn setup_with(
        loader: InMemoryMediaLoader,
        evict_unreferenced: bool,
    ) -> (CellLifecycleController, Arc<InMemoryMediaLoader>) {
        let loader = Arc::new(loader);
        let cache = Arc::new(CellMediaCache::new(CacheLimits::unbounded()));
        let controller = CellLifecycleController::new(cache, loader.clone(), evict_unreferenced, 64);
        (controller, loader)
    }

    /// Decodes synchronously inside `load`, so aborting the task cannot stop
    /// a result that is already being produced.
    struct BlockingLoader {
        started: std::sync::atomic::AtomicBool,
        finished: std::sync::atomic::AtomicBool,
        release: parking_lot::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    #[async_trait::async_trait]
    impl MediaLoader for BlockingLoader {
        async fn load(&self, content: &ContentId) -> Result<CellMediaEntry, SourceError> {
            self.started.store(true, Ordering::SeqCst);
            let _ = self.release.lock().recv();
            self.finished.store(true, Ordering::SeqCst);
            Ok(CellMediaEntry::new(content.as_str().as_bytes().to_vec()))
        }
    }

    fn blocking_setup() -> (CellLifecycleController, Arc<BlockingLoader>, std::sync::mpsc::Sender<()>) {
        let (release, rx) = std::sync::mpsc::channel();
        let loader = Arc::new(BlockingLoader {
            started: std::sync::atomic::AtomicBool::new(false),
            finished: std::sync::atomic::AtomicBool::new(false),
            release: parking_lot::Mutex::new(rx),
        });
        let cache = Arc::new(CellMediaCache::new(CacheLimits::unbounded()));
        let controller = CellLifecycleController::new(cache, loader.clone(), false, 64);
        (controller, loader, release)
    }

    async fn wait_flag(flag: &std::sync::atomic::AtomicBool, what: &str) {
        for _ in 0..500 {
            if flag.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn wait_for(controller: &CellLifecycleController, cell: CellId, state: CellState) {
        for _ in 0..200 {
            if controller.state(cell) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("{cell} never reached {state}, stuck in {:?}", controller.state(cell));
    }

    #[tokio::test]
    async fn test_prefetched_cell_does_no_work() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("a"), CellMediaEntry::new(vec![1]));
        let (controller, loader) = setup(loader);

        controller.bind(CellId(1), Some(content("a")));
        controller.on_visibility_changed(CellId(1), false);

        assert_eq!(controller.state(CellId(1)), Some(CellState::Prefetched));
        tokio::task::yield_now().await;
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_visible_cell_loads_then_hidden_evicts() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("a"), CellMediaEntry::new(vec![1, 2]));
        let (controller, _loader) = setup(loader);
        let cell = CellId(1);

        controller.bind(cell, Some(content("a")));
        controller.on_visibility_changed(cell, true);
        assert_eq!(controller.state(cell), Some(CellState::Loading));

        wait_for(&controller, cell, CellState::Loaded).await;
        assert_eq!(controller.content_for(cell).unwrap().bytes(), &[1, 2]);
        assert_eq!(controller.referents(&content("a")), 1);

        controller.on_visibility_changed(cell, false);
        assert_eq!(controller.state(cell), Some(CellState::Evicted));
        assert!(controller.content_for(cell).is_none());
        assert_eq!(controller.referents(&content("a")), 0);
        assert!(controller.cache().get(&content("a")).is_none());
    }

    #[tokio::test]
    async fn test_hidden_twice_is_idempotent() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("a"), CellMediaEntry::new(vec![1]));
        let (controller, _loader) = setup(loader);
        let cell = CellId(1);
        let mut events = controller.subscribe();

        controller.bind(cell, Some(content("a")));
        controller.on_visibility_changed(cell, true);
        wait_for(&controller, cell, CellState::Loaded).await;
        controller.on_visibility_changed(cell, false);
        controller.on_visibility_changed(cell, false);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push((event.from, event.to));
        }
        assert_eq!(
            seen,
            vec![
                (CellState::Prefetched, CellState::Loading),
                (CellState::Loading, CellState::Loaded),
                (CellState::Loaded, CellState::Evicted),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_content_survives_until_last_referent() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("shared"), CellMediaEntry::new(vec![9]));
        let (controller, _loader) = setup(loader);

        for id in [1, 2] {
            controller.bind(CellId(id), Some(content("shared")));
            controller.on_visibility_changed(CellId(id), true);
            wait_for(&controller, CellId(id), CellState::Loaded).await;
        }
        assert_eq!(controller.referents(&content("shared")), 2);

        controller.on_visibility_changed(CellId(1), false);
        assert!(controller.cache().contains(&content("shared")));

        controller.on_visibility_changed(CellId(2), false);
        assert!(!controller.cache().contains(&content("shared")));
    }

    #[tokio::test]
    async fn test_second_cell_is_served_from_cache() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("a"), CellMediaEntry::new(vec![1]));
        let (controller, loader) = setup(loader);

        controller.bind(CellId(1), Some(content("a")));
        controller.on_visibility_changed(CellId(1), true);
        wait_for(&controller, CellId(1), CellState::Loaded).await;

        controller.bind(CellId(2), Some(content("a")));
        controller.on_visibility_changed(CellId(2), true);
        assert_eq!(controller.state(CellId(2)), Some(CellState::Loaded));
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_for_hidden_cell_is_discarded() {
        let loader = InMemoryMediaLoader::with_delay(Duration::from_millis(50));
        loader.insert(content("slow"), CellMediaEntry::new(vec![1]));
        let (controller, _loader) = setup(loader);
        let cell = CellId(7);

        controller.bind(cell, Some(content("slow")));
        controller.on_visibility_changed(cell, true);
        tokio::task::yield_now().await;
        controller.on_visibility_changed(cell, false);
        assert_eq!(controller.state(cell), Some(CellState::Evicted));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.state(cell), Some(CellState::Evicted));
        assert!(controller.content_for(cell).is_none());
        assert!(controller.cache().is_empty());
        assert_eq!(controller.referents(&content("slow")), 0);
    }

    #[tokio::test]
    async fn test_failed_load_stays_loading_until_retried() {
        let (controller, loader) = setup(InMemoryMediaLoader::new());
        let cell = CellId(3);

        controller.bind(cell, Some(content("later")));
        controller.on_visibility_changed(cell, true);
        for _ in 0..200 {
            if controller.load_failed(cell) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(controller.load_failed(cell));
        assert_eq!(controller.state(cell), Some(CellState::Loading));

        loader.insert(content("later"), CellMediaEntry::new(vec![5]));
        assert!(controller.retry_failed(cell));
        wait_for(&controller, cell, CellState::Loaded).await;
        assert!(!controller.retry_failed(cell));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_cell() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("good"), CellMediaEntry::new(vec![1]));
        let (controller, _loader) = setup(loader);

        controller.bind(CellId(1), Some(content("bad")));
        controller.bind(CellId(2), Some(content("good")));
        controller.on_visibility_changed(CellId(1), true);
        controller.on_visibility_changed(CellId(2), true);

        wait_for(&controller, CellId(2), CellState::Loaded).await;
        assert_eq!(controller.state(CellId(1)), Some(CellState::Loading));
        assert!(controller.cache().contains(&content("good")));
    }

    #[tokio::test]
    async fn test_evacuate_releases_everything() {
        let loader = InMemoryMediaLoader::new();
        for i in 0..4 {
            loader.insert(content(&format!("m{i}")), CellMediaEntry::new(vec![i as u8]));
        }
        let (controller, _loader) = setup(loader);
        for i in 0..4 {
            controller.bind(CellId(i), Some(content(&format!("m{i}"))));
            controller.on_visibility_changed(CellId(i), true);
            wait_for(&controller, CellId(i), CellState::Loaded).await;
        }

        assert_eq!(controller.evacuate(PressureSignal::LowMemory), 4);
        for i in 0..4 {
            assert_eq!(controller.state(CellId(i)), Some(CellState::Evicted));
            assert!(controller.content_for(CellId(i)).is_none());
        }
        assert!(controller.cache().is_empty());

        assert_eq!(controller.reload_visible(), 4);
        wait_for(&controller, CellId(0), CellState::Loaded).await;
    }

    #[tokio::test]
    async fn test_rebind_visible_cell_switches_content() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("old"), CellMediaEntry::new(vec![1]));
        loader.insert(content("new"), CellMediaEntry::new(vec![2]));
        let (controller, _loader) = setup(loader);
        let cell = CellId(1);

        controller.bind(cell, Some(content("old")));
        controller.on_visibility_changed(cell, true);
        wait_for(&controller, cell, CellState::Loaded).await;

        controller.bind(cell, Some(content("new")));
        assert_eq!(controller.state(cell), Some(CellState::Loading));
        assert_eq!(controller.referents(&content("old")), 0);
        wait_for(&controller, cell, CellState::Loaded).await;
        assert_eq!(controller.content_for(cell).unwrap().bytes(), &[2]);
    }

    #[tokio::test]
    async fn test_unbound_cell_has_no_content() {
        let (controller, _loader) = setup(InMemoryMediaLoader::new());
        controller.on_visibility_changed(CellId(9), true);
        assert_eq!(controller.state(CellId(9)), Some(CellState::Prefetched));
        assert!(controller.content_for(CellId(9)).is_none());

        controller.unbind(CellId(9));
        assert_eq!(controller.state(CellId(9)), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_load_finishing_after_hide_is_not_cached() {
        let (controller, loader, release) = blocking_setup();
        let cell = CellId(1);
        controller.bind(cell, Some(content("photo")));
        controller.on_visibility_changed(cell, true);
        wait_flag(&loader.started, "load start").await;

        controller.on_visibility_changed(cell, false);
        release.send(()).unwrap();
        wait_flag(&loader.finished, "load finish").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(controller.state(cell), Some(CellState::Evicted));
        assert!(controller.cache().is_empty());
        assert_eq!(controller.referents(&content("photo")), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_load_finishing_after_evacuate_is_not_cached() {
        let (controller, loader, release) = blocking_setup();
        let cell = CellId(1);
        controller.bind(cell, Some(content("photo")));
        controller.on_visibility_changed(cell, true);
        wait_flag(&loader.started, "load start").await;

        assert_eq!(controller.evacuate(PressureSignal::LowMemory), 1);
        release.send(()).unwrap();
        wait_flag(&loader.finished, "load finish").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(controller.state(cell), Some(CellState::Evicted));
        assert!(controller.cache().is_empty());
        assert!(controller.cache().get(&content("photo")).is_none());
    }

    #[tokio::test]
    async fn test_released_content_stays_cached_without_unreferenced_eviction() {
        let loader = InMemoryMediaLoader::new();
        loader.insert(content("a"), CellMediaEntry::new(vec![1, 2]));
        let (controller, loader) = setup_with(loader, false);
        let cell = CellId(1);

        controller.bind(cell, Some(content("a")));
        controller.on_visibility_changed(cell, true);
        wait_for(&controller, cell, CellState::Loaded).await;
        controller.on_visibility_changed(cell, false);

        assert_eq!(controller.state(cell), Some(CellState::Evicted));
        assert_eq!(controller.referents(&content("a")), 0);
        assert!(controller.cache().contains(&content("a")));

        // Shown again without another load.
        controller.on_visibility_changed(cell, true);
        wait_for(&controller, cell, CellState::Loaded).await;
        assert_eq!(loader.load_count(), 1);

        controller.evacuate(PressureSignal::ViewObscured);
        assert!(controller.cache().is_empty());
    }
}
