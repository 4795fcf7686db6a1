// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conversation engine coordinator.
//!
//! The [`ConversationEngine`] is the explicit state object that owns both
//! subsystems and is passed by reference to whoever needs them:
//! - Directory index, refresh controller and resolver
//! - Cell media cache and lifecycle controller
//!
//! There is no global state; two engines in one process are independent.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Starting → Ready → ShuttingDown → Stopped
//! ```
//!
//! # Example
//!
//! ```rust
//! use conversation_core::{
//!     Collaborators, ContactRecord, ConversationEngine, EngineConfig, EngineState,
//!     IdentityKey, InMemoryAccountRegistry, InMemoryContactSource, InMemoryImageDecoder,
//!     InMemoryMediaLoader,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let key = IdentityKey::parse("+15551230000").unwrap();
//! let collaborators = Collaborators {
//!     contacts: Arc::new(InMemoryContactSource::new(vec![ContactRecord::new("Alice", "", vec![key.clone()])])),
//!     accounts: Arc::new(InMemoryAccountRegistry::new()),
//!     decoder: Arc::new(InMemoryImageDecoder::new()),
//!     media: Arc::new(InMemoryMediaLoader::new()),
//! };
//! let engine = ConversationEngine::new(EngineConfig::default(), collaborators);
//! assert_eq!(engine.state(), EngineState::Created);
//!
//! engine.start().await.unwrap();
//! assert!(engine.is_ready());
//! assert_eq!(engine.resolver().display_name(&key), "Alice");
//!
//! engine.shutdown();
//! assert_eq!(engine.state(), EngineState::Stopped);
//! # }
//! ```

mod lifecycle;
mod types;

pub use types::{EngineState, EngineStats};

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::contacts::{ContactsManager, SystemContactsManager};
use crate::directory::{DirectoryChanged, DirectoryIndex, RefreshController};
use crate::media::{CellId, CellLifecycleController, CellMediaCache, CellTransition};
use crate::pressure::PressureSignal;
use crate::resolver::{KeyFormatter, Resolver};
use crate::sources::traits::{AccountRegistry, ContactSource, ImageDecoder, MediaLoader};

/// External collaborators the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub contacts: Arc<dyn ContactSource>,
    pub accounts: Arc<dyn AccountRegistry>,
    pub decoder: Arc<dyn ImageDecoder>,
    pub media: Arc<dyn MediaLoader>,
}

/// Owns the directory and cell-media subsystems.
///
/// # Thread Safety
///
/// `Send + Sync`; every component guards its own state and no operation
/// holds one component's lock while taking another's.
pub struct ConversationEngine {
    config: EngineConfig,

    /// Engine state (broadcast to watchers)
    state: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,

    index: Arc<DirectoryIndex>,
    resolver: Arc<Resolver>,
    refresh: RefreshController,
    contacts: SystemContactsManager,
    media: CellLifecycleController,
}

impl ConversationEngine {
    /// Create a new engine. Nothing is fetched until [`start`](Self::start).
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);

        let index = Arc::new(DirectoryIndex::new(KeyFormatter::new(config.default_country_code.clone())));
        let resolver = Arc::new(Resolver::new(index.clone(), collaborators.decoder, config.avatar_limits()));
        let refresh = RefreshController::new(
            collaborators.contacts,
            collaborators.accounts,
            index.clone(),
            config.notification_capacity,
        );
        let contacts = SystemContactsManager::new(resolver.clone(), refresh.clone());
        let media = CellLifecycleController::new(
            Arc::new(CellMediaCache::new(config.media_limits())),
            collaborators.media,
            config.evict_unreferenced_media,
            config.notification_capacity,
        );

        debug!(?config, "Conversation engine created");
        Self {
            config,
            state: state_tx,
            state_rx,
            index,
            resolver,
            refresh,
            contacts,
            media,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<DirectoryIndex> {
        &self.index
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    #[must_use]
    pub fn refresh_controller(&self) -> &RefreshController {
        &self.refresh
    }

    /// Names, avatars and refresh behind the substitutable interface.
    #[must_use]
    pub fn contacts_manager(&self) -> &dyn ContactsManager {
        &self.contacts
    }

    #[must_use]
    pub fn media(&self) -> &CellLifecycleController {
        &self.media
    }

    pub fn subscribe_directory(&self) -> broadcast::Receiver<DirectoryChanged> {
        self.refresh.subscribe()
    }

    pub fn subscribe_cells(&self) -> broadcast::Receiver<CellTransition> {
        self.media.subscribe()
    }

    /// Forward a visibility signal. Ignored once shutdown has begun.
    pub fn on_visibility_changed(&self, cell: CellId, visible: bool) {
        if self.state().is_live() {
            self.media.on_visibility_changed(cell, visible);
        }
    }

    /// Shed memory. Returns the number of cells evacuated.
    pub fn on_pressure(&self, signal: PressureSignal) -> usize {
        info!(signal = %signal, "{}", signal.description());
        let evacuated = if signal.evacuates_media() {
            self.media.evacuate(signal)
        } else {
            0
        };
        if signal.clears_avatars() {
            self.resolver.clear_avatars();
        }
        evacuated
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            avatars: self.resolver.avatar_stats(),
            media: self.media.cache().stats(),
            directory_entries: self.index.len(),
            cells: self.media.cell_count(),
        }
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state.send(state);
        crate::metrics::set_engine_state(&state.to_string());
    }
}
