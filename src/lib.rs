//! # Conversation Core
//!
//! Bounded-memory media caching for scrollable conversation cells, and a
//! contact directory that merges the local address book with a remote
//! account registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ConversationEngine                         │
//! │  • Explicit state object, start() / shutdown()             │
//! │  • Routes visibility and pressure signals                  │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │ Directory                    │  │ Cell media                   │
//! │  • RefreshController         │  │  • CellLifecycleController   │
//! │    (one in-flight refresh)   │  │    Prefetched → Loading      │
//! │  • DirectoryIndex            │  │    → Loaded → Evicted        │
//! │    (map + order, ArcSwap)    │  │  • CellMediaCache (LRU)      │
//! │  • Resolver + avatar LRU     │  │                              │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//!   ContactSource, AccountRegistry,        MediaLoader
//!   ImageDecoder (external)                (external)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use conversation_core::{
//!     CellId, Collaborators, ContactRecord, ContentId, ConversationEngine, EngineConfig,
//!     IdentityKey, InMemoryAccountRegistry, InMemoryContactSource, InMemoryImageDecoder,
//!     InMemoryMediaLoader, PressureSignal,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let key = IdentityKey::parse("+15551230000").unwrap();
//!     let engine = ConversationEngine::new(
//!         EngineConfig::default(),
//!         Collaborators {
//!             contacts: Arc::new(InMemoryContactSource::new(vec![
//!                 ContactRecord::new("Alice", "", vec![key.clone()]),
//!             ])),
//!             accounts: Arc::new(InMemoryAccountRegistry::new()),
//!             decoder: Arc::new(InMemoryImageDecoder::new()),
//!             media: Arc::new(InMemoryMediaLoader::new()),
//!         },
//!     );
//!
//!     // Fetch the directory if contact access is already granted
//!     engine.start().await.expect("Failed to start");
//!     println!("{}", engine.resolver().display_name(&key));
//!
//!     // Cells load media only while visible
//!     engine.media().bind(CellId(1), Some(ContentId::new("attachment-1")));
//!     engine.on_visibility_changed(CellId(1), true);
//!
//!     // ...and drop it under pressure
//!     engine.on_pressure(PressureSignal::LowMemory);
//!
//!     engine.shutdown();
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`EngineConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`ConversationEngine`] owning both subsystems
//! - [`identity`]: Identity keys, contact/account records, directory entries
//! - [`directory`]: Directory index and refresh controller
//! - [`resolver`]: Display names, avatars, ordering
//! - [`contacts`]: Substitutable contacts-manager interface
//! - [`media`]: Cell media cache and lifecycle controller
//! - [`pressure`]: Memory and visibility pressure signals
//! - [`sources`]: Collaborator traits and in-memory implementations
//! - [`eviction`]: Bounded LRU shared by both caches

pub mod config;
pub mod contacts;
pub mod coordinator;
pub mod directory;
pub mod eviction;
pub mod identity;
pub mod media;
pub mod metrics;
pub mod pressure;
pub mod resolver;
pub mod sources;

pub use config::EngineConfig;
pub use contacts::{ContactsManager, SystemContactsManager};
pub use coordinator::{Collaborators, ConversationEngine, EngineState, EngineStats};
pub use directory::{
    DirectoryChanged, DirectoryError, DirectoryIndex, DirectorySnapshot, PublishReport, RefreshController,
    RefreshOutcome,
};
pub use eviction::{BoundedLru, CacheLimits, CacheStats, SizedItem};
pub use identity::{AccountRecord, ContactRecord, DirectoryEntry, IdentityKey, Image, ImageRef};
pub use media::{
    CellId, CellLifecycleController, CellMediaCache, CellMediaEntry, CellState, CellTransition, ContentId,
    VisibilityEvent,
};
pub use metrics::LatencyTimer;
pub use pressure::PressureSignal;
pub use resolver::{compare_entries, AvatarCache, KeyFormatter, Resolver, StyleHints, StyledName, StyledSpan};
pub use sources::{
    AccountRegistry, Authorization, ContactSource, ImageDecoder, InMemoryAccountRegistry, InMemoryContactSource,
    InMemoryImageDecoder, InMemoryMediaLoader, MediaLoader, SourceError,
};
