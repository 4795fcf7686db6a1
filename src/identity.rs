// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Identity records: the data the directory is built from.
//!
//! [`ContactRecord`]s come from the local contact source and
//! [`AccountRecord`]s from the remote account registry. A [`DirectoryEntry`]
//! is the merge of at most one of each for a single [`IdentityKey`].
//!
//! Records are shared as `Arc` snapshots and never mutated once built; a
//! refresh replaces entries wholesale.
//!
//! # Example
//!
//! ```
//! use conversation_core::{IdentityKey, ContactRecord, DirectoryEntry};
//! use std::sync::Arc;
//!
//! let key = IdentityKey::parse("+1 (555) 123-0000").unwrap();
//! assert_eq!(key.as_str(), "+15551230000");
//!
//! let alice = Arc::new(ContactRecord::new("Alice", "", vec![key.clone()]));
//! let entry = DirectoryEntry::merge(key, Some(alice), None).unwrap();
//! assert!(!entry.is_registered());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::sources::traits::SourceError;

/// Opaque stable identifier for a person (a normalized phone number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Normalize a raw identifier.
    ///
    /// Keeps a leading `+` and every alphanumeric character, dropping the
    /// punctuation people type into phone numbers. Fails if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        let trimmed = raw.trim();
        let mut normalized = String::with_capacity(trimmed.len());
        if trimmed.starts_with('+') {
            normalized.push('+');
        }
        normalized.extend(trimmed.chars().filter(|c| c.is_ascii_alphanumeric()));

        if normalized.is_empty() || normalized == "+" {
            return Err(SourceError::MergeConflict {
                key: raw.to_string(),
                reason: "identity key is empty after normalization".into(),
            });
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an undecoded image owned by a collaborator.
///
/// The reference string doubles as the avatar cache key, so two records
/// pointing at the same image share one decoded copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decoded image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Image {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Decoded size, used for the avatar cache byte budget.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

/// Locally-sourced identity data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub given_name: String,
    pub family_name: String,
    /// Every identity key the contact lists (one entry is built per key).
    pub keys: Vec<IdentityKey>,
    pub image: Option<ImageRef>,
}

impl ContactRecord {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>, keys: Vec<IdentityKey>) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
            keys,
            image: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    /// Contact synthesized for a key with no local record.
    #[must_use]
    pub fn placeholder(key: IdentityKey) -> Self {
        Self::new("", "", vec![key])
    }

    /// "Given Family", trimmed. Empty when the contact has no name.
    #[must_use]
    pub fn full_name(&self) -> String {
        let given = self.given_name.trim();
        let family = self.family_name.trim();
        match (given.is_empty(), family.is_empty()) {
            (true, true) => String::new(),
            (false, true) => given.to_string(),
            (true, false) => family.to_string(),
            (false, false) => format!("{given} {family}"),
        }
    }
}

/// Remote-registry identity data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub key: IdentityKey,
    pub registered: bool,
    pub profile_name: Option<String>,
    pub profile_image: Option<ImageRef>,
}

impl AccountRecord {
    pub fn registered(key: IdentityKey) -> Self {
        Self {
            key,
            registered: true,
            profile_name: None,
            profile_image: None,
        }
    }

    #[must_use]
    pub fn with_profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_profile_image(mut self, image: ImageRef) -> Self {
        self.profile_image = Some(image);
        self
    }
}

/// Merge of at most one contact and at most one account for one key.
///
/// Immutable; the directory replaces entries, it never edits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    key: IdentityKey,
    contact: Option<Arc<ContactRecord>>,
    account: Option<Arc<AccountRecord>>,
}

impl DirectoryEntry {
    /// Build an entry, rejecting records that do not belong to `key`.
    ///
    /// An entry needs at least one side; the contact must list the key and
    /// the account must be keyed by it.
    pub fn merge(
        key: IdentityKey,
        contact: Option<Arc<ContactRecord>>,
        account: Option<Arc<AccountRecord>>,
    ) -> Result<Self, SourceError> {
        if contact.is_none() && account.is_none() {
            return Err(SourceError::MergeConflict {
                key: key.to_string(),
                reason: "entry has neither a contact nor an account".into(),
            });
        }
        if let Some(ref contact) = contact {
            if !contact.keys.contains(&key) {
                return Err(SourceError::MergeConflict {
                    key: key.to_string(),
                    reason: "contact does not list this key".into(),
                });
            }
        }
        if let Some(ref account) = account {
            if account.key != key {
                return Err(SourceError::MergeConflict {
                    key: key.to_string(),
                    reason: format!("account is keyed by {}", account.key),
                });
            }
        }
        Ok(Self { key, contact, account })
    }

    #[must_use]
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    #[must_use]
    pub fn contact(&self) -> Option<&ContactRecord> {
        self.contact.as_deref()
    }

    #[must_use]
    pub fn account(&self) -> Option<&AccountRecord> {
        self.account.as_deref()
    }

    /// True when a registered account is attached.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.account.as_ref().is_some_and(|a| a.registered)
    }
}
