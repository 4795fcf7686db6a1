//! Display-name resolution, key formatting and the directory order.
//!
//! Kept free of caches and locks so the directory index can sort with the
//! exact names the resolver shows.

use std::cmp::Ordering;

use crate::identity::{ContactRecord, DirectoryEntry, IdentityKey};

/// Formats identity keys for display when no name is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormatter {
    default_country_code: String,
}

impl Default for KeyFormatter {
    fn default() -> Self {
        Self::new("1")
    }
}

impl KeyFormatter {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    /// Human-readable form of `key`. Never empty.
    ///
    /// North American numbers become `+1 555-123-0000`; a bare ten-digit
    /// number is treated as national when the default country code is `1`.
    /// Anything else is shown as stored.
    #[must_use]
    pub fn format(&self, key: &IdentityKey) -> String {
        let raw = key.as_str();
        let digits = raw.strip_prefix('+').unwrap_or(raw);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return raw.to_string();
        }

        let national = if raw.starts_with('+') {
            digits.strip_prefix('1').filter(|n| n.len() == 10)
        } else if self.default_country_code == "1" && digits.len() == 10 {
            Some(digits)
        } else {
            None
        };

        match national {
            Some(n) => format!("+1 {}-{}-{}", &n[..3], &n[3..6], &n[6..]),
            None => raw.to_string(),
        }
    }
}

/// Where a display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource<'a> {
    /// Registry profile name
    Profile(&'a str),
    /// Local contact with a non-empty name
    Contact(&'a ContactRecord),
    /// Nothing known; fall back to the key
    Key,
}

/// First non-empty source in the fallback chain.
#[must_use]
pub fn name_source(entry: Option<&DirectoryEntry>) -> NameSource<'_> {
    let Some(entry) = entry else {
        return NameSource::Key;
    };
    if let Some(name) = entry
        .account()
        .and_then(|a| a.profile_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return NameSource::Profile(name);
    }
    match entry.contact() {
        Some(contact) if !contact.full_name().is_empty() => NameSource::Contact(contact),
        _ => NameSource::Key,
    }
}

/// Resolve the display name for `key`: profile name, then contact name,
/// then the formatted key.
#[must_use]
pub fn display_name(key: &IdentityKey, entry: Option<&DirectoryEntry>, formatter: &KeyFormatter) -> String {
    match name_source(entry) {
        NameSource::Profile(name) => name.to_string(),
        NameSource::Contact(contact) => contact.full_name(),
        NameSource::Key => formatter.format(key),
    }
}

/// Precomputed sort key for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    registered: bool,
    folded_name: String,
    key: IdentityKey,
}

impl SortKey {
    #[must_use]
    pub fn for_entry(entry: &DirectoryEntry, formatter: &KeyFormatter) -> Self {
        Self {
            registered: entry.is_registered(),
            folded_name: display_name(entry.key(), Some(entry), formatter).to_lowercase(),
            key: entry.key().clone(),
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Registered first, then name, then key for a total order.
        other
            .registered
            .cmp(&self.registered)
            .then_with(|| self.folded_name.cmp(&other.folded_name))
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Directory comparator: registered accounts first, then case-insensitive
/// display name, then identity key.
#[must_use]
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry, formatter: &KeyFormatter) -> Ordering {
    SortKey::for_entry(a, formatter).cmp(&SortKey::for_entry(b, formatter))
}
