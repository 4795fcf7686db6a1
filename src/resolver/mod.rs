// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Name and avatar resolution over the directory index.
//!
//! # Fallback chains
//!
//! ```text
//!   display_name(key)                  image(key)
//!   ─────────────────                  ──────────
//!   1. account profile name            1. account profile image ┐
//!   2. contact full name               2. contact image         ├─▶ avatar cache ─▶ decoder
//!   3. formatted key (never empty)     3. none                  ┘
//! ```
//!
//! Reads go through the current directory snapshot and never wait on a
//! refresh. The only lock taken is the avatar cache's.

pub mod avatar_cache;
pub mod format;

use std::sync::Arc;

use tracing::warn;

use crate::directory::DirectoryIndex;
use crate::eviction::{CacheLimits, CacheStats};
use crate::identity::{ContactRecord, IdentityKey, Image};
use crate::sources::traits::ImageDecoder;

pub use avatar_cache::AvatarCache;
pub use format::{compare_entries, KeyFormatter, NameSource};

/// Which part of a name to emphasize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleHints {
    #[default]
    None,
    /// Emphasize the family name of a contact-sourced name.
    FamilyName,
    /// Emphasize the whole name.
    Whole,
}

/// A run of text with a single style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub emphasized: bool,
}

impl StyledSpan {
    fn new(text: impl Into<String>, emphasized: bool) -> Self {
        Self {
            text: text.into(),
            emphasized,
        }
    }
}

/// Display name split into styled spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledName {
    pub spans: Vec<StyledSpan>,
}

impl StyledName {
    /// The name without styling; always equals `display_name`.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Resolves display names and avatars for identity keys.
pub struct Resolver {
    index: Arc<DirectoryIndex>,
    avatars: AvatarCache,
    decoder: Arc<dyn ImageDecoder>,
}

impl Resolver {
    pub fn new(index: Arc<DirectoryIndex>, decoder: Arc<dyn ImageDecoder>, avatar_limits: CacheLimits) -> Self {
        Self {
            index,
            avatars: AvatarCache::new(avatar_limits),
            decoder,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<DirectoryIndex> {
        &self.index
    }

    /// Name to show for `key`. Never empty.
    #[must_use]
    pub fn display_name(&self, key: &IdentityKey) -> String {
        let entry = self.index.lookup(key);
        format::display_name(key, entry.as_deref(), self.index.formatter())
    }

    /// Avatar for `key`, decoding and caching it on first use.
    ///
    /// A decode failure is logged and yields `None`; the next call tries again.
    #[must_use]
    pub fn image(&self, key: &IdentityKey) -> Option<Image> {
        let entry = self.index.lookup(key)?;
        let reference = entry
            .account()
            .and_then(|a| a.profile_image.clone())
            .or_else(|| entry.contact().and_then(|c| c.image.clone()))?;

        if let Some(cached) = self.avatars.get(&reference) {
            return Some(cached);
        }

        match self.decoder.decode(&reference) {
            Ok(image) => {
                self.avatars.put(reference, image.clone());
                Some(image)
            }
            Err(e) => {
                warn!(key = %key, image = %reference.as_str(), error = %e, "Avatar decode failed");
                crate::metrics::record_error("resolver", "decode_avatar", "decode");
                None
            }
        }
    }

    /// Display name with presentation hints applied.
    #[must_use]
    pub fn formatted_name(&self, key: &IdentityKey, hints: StyleHints) -> StyledName {
        let entry = self.index.lookup(key);
        let whole = hints == StyleHints::Whole;

        let spans = match format::name_source(entry.as_deref()) {
            NameSource::Profile(name) => vec![StyledSpan::new(name, whole)],
            NameSource::Contact(contact) if hints == StyleHints::FamilyName => {
                let given = contact.given_name.trim();
                let family = contact.family_name.trim();
                let mut spans = Vec::with_capacity(3);
                if !given.is_empty() {
                    spans.push(StyledSpan::new(given, false));
                    if !family.is_empty() {
                        spans.push(StyledSpan::new(" ", false));
                    }
                }
                if !family.is_empty() {
                    spans.push(StyledSpan::new(family, true));
                }
                spans
            }
            NameSource::Contact(contact) => vec![StyledSpan::new(contact.full_name(), whole)],
            NameSource::Key => vec![StyledSpan::new(self.index.formatter().format(key), whole)],
        };
        StyledName { spans }
    }

    /// The published contact for `key`, or a placeholder carrying only the key.
    #[must_use]
    pub fn contact_or_placeholder(&self, key: &IdentityKey) -> ContactRecord {
        self.index
            .lookup(key)
            .and_then(|entry| entry.contact().cloned())
            .unwrap_or_else(|| ContactRecord::placeholder(key.clone()))
    }

    /// Drop all decoded avatars.
    pub fn clear_avatars(&self) {
        self.avatars.clear();
    }

    #[must_use]
    pub fn avatar_stats(&self) -> CacheStats {
        self.avatars.stats()
    }
}
