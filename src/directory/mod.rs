// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Directory index: a lookup map and a display-ordered sequence over
//! [`DirectoryEntry`], published together.
//!
//! ```text
//!   RefreshController ──publish()──▶ build DirectorySnapshot
//!                                          │  (map + ordered, generation N+1)
//!                                          ▼
//!                                   ArcSwap::store()
//!                                          │
//!        readers ◀──load()── Arc<DirectorySnapshot>  (generation N or N+1,
//!                                                     never a mix)
//! ```
//!
//! Readers never lock: they load the current `Arc` and keep iterating it
//! even while a newer snapshot is stored. A single mutex serializes
//! writers so generations are strictly increasing.
//!
//! # Example
//!
//! ```
//! use conversation_core::{ContactRecord, DirectoryEntry, DirectoryIndex, IdentityKey};
//! use std::sync::Arc;
//!
//! let index = DirectoryIndex::default();
//! let key = IdentityKey::parse("+15551230000").unwrap();
//! let alice = Arc::new(ContactRecord::new("Alice", "", vec![key.clone()]));
//! index.publish(vec![DirectoryEntry::merge(key.clone(), Some(alice), None).unwrap()]);
//!
//! assert!(index.lookup(&key).is_some());
//! assert_eq!(index.ordered_entries().len(), 1);
//! ```

pub mod refresh;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::identity::{DirectoryEntry, IdentityKey};
use crate::resolver::format::{KeyFormatter, SortKey};
use crate::sources::traits::SourceError;

pub use refresh::{DirectoryChanged, DirectoryError, RefreshController, RefreshOutcome};

/// One published state of the directory.
#[derive(Debug)]
pub struct DirectorySnapshot {
    generation: u64,
    by_key: HashMap<IdentityKey, Arc<DirectoryEntry>>,
    ordered: Arc<[Arc<DirectoryEntry>]>,
}

impl Default for DirectorySnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            by_key: HashMap::new(),
            ordered: Arc::from(Vec::new()),
        }
    }
}

impl DirectorySnapshot {
    /// Number of publishes before this one. The empty initial state is 0.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn lookup(&self, key: &IdentityKey) -> Option<&Arc<DirectoryEntry>> {
        self.by_key.get(key)
    }

    #[must_use]
    pub fn ordered(&self) -> &[Arc<DirectoryEntry>] {
        &self.ordered
    }

    /// Entries with a registered account, in display order.
    pub fn registered(&self) -> impl Iterator<Item = &Arc<DirectoryEntry>> + '_ {
        self.ordered.iter().filter(|e| e.is_registered())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// What a publish did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub generation: u64,
    pub published: usize,
    /// Records rejected as malformed or duplicate.
    pub dropped: usize,
}

/// Copy-on-publish directory index.
pub struct DirectoryIndex {
    current: ArcSwap<DirectorySnapshot>,
    formatter: KeyFormatter,
    /// Serializes writers only.
    publish_lock: Mutex<()>,
}

impl Default for DirectoryIndex {
    fn default() -> Self {
        Self::new(KeyFormatter::default())
    }
}

impl DirectoryIndex {
    /// Empty index. `formatter` must match the resolver's so the order
    /// follows the names actually shown.
    #[must_use]
    pub fn new(formatter: KeyFormatter) -> Self {
        Self {
            current: ArcSwap::from_pointee(DirectorySnapshot::default()),
            formatter,
            publish_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn formatter(&self) -> &KeyFormatter {
        &self.formatter
    }

    /// Replace the whole directory.
    ///
    /// The first entry for a key wins; later duplicates are dropped.
    pub fn publish(&self, entries: impl IntoIterator<Item = DirectoryEntry>) -> PublishReport {
        self.publish_results(entries.into_iter().map(Ok))
    }

    /// Replace the whole directory from records that may have failed to
    /// build. Failures are dropped and the rest still publish.
    pub fn publish_results(
        &self,
        records: impl IntoIterator<Item = Result<DirectoryEntry, SourceError>>,
    ) -> PublishReport {
        let mut by_key: HashMap<IdentityKey, Arc<DirectoryEntry>> = HashMap::new();
        let mut keyed: Vec<(SortKey, Arc<DirectoryEntry>)> = Vec::new();
        let mut dropped = 0usize;

        for record in records {
            let entry = match record {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed directory record");
                    dropped += 1;
                    continue;
                }
            };
            if by_key.contains_key(entry.key()) {
                warn!(key = %entry.key(), "Dropping duplicate directory entry");
                dropped += 1;
                continue;
            }
            let entry = Arc::new(entry);
            keyed.push((SortKey::for_entry(&entry, &self.formatter), entry.clone()));
            by_key.insert(entry.key().clone(), entry);
        }

        keyed.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let ordered: Arc<[Arc<DirectoryEntry>]> = keyed.into_iter().map(|(_, e)| e).collect();
        let published = ordered.len();

        let generation = {
            let _writer = self.publish_lock.lock();
            let generation = self.current.load().generation + 1;
            self.current.store(Arc::new(DirectorySnapshot {
                generation,
                by_key,
                ordered,
            }));
            generation
        };

        debug!(generation, published, dropped, "Directory published");
        crate::metrics::record_publish(published, dropped);
        PublishReport {
            generation,
            published,
            dropped,
        }
    }

    /// Current snapshot. Holding it pins that generation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.current.load_full()
    }

    #[must_use]
    pub fn lookup(&self, key: &IdentityKey) -> Option<Arc<DirectoryEntry>> {
        self.current.load().by_key.get(key).cloned()
    }

    /// Currently published order; safe to iterate across later publishes.
    #[must_use]
    pub fn ordered_entries(&self) -> Arc<[Arc<DirectoryEntry>]> {
        self.current.load().ordered.clone()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AccountRecord, ContactRecord};

    fn key(raw: &str) -> IdentityKey {
        IdentityKey::parse(raw).unwrap()
    }

    fn contact(k: &str, given: &str) -> DirectoryEntry {
        let k = key(k);
        let c = Arc::new(ContactRecord::new(given, "", vec![k.clone()]));
        DirectoryEntry::merge(k, Some(c), None).unwrap()
    }

    fn registered(k: &str, name: &str) -> DirectoryEntry {
        let k = key(k);
        let a = Arc::new(AccountRecord::registered(k.clone()).with_profile_name(name));
        DirectoryEntry::merge(k, None, Some(a)).unwrap()
    }

    fn names(index: &DirectoryIndex) -> Vec<String> {
        index
            .ordered_entries()
            .iter()
            .map(|e| e.key().to_string())
            .collect()
    }

    #[test]
    fn test_empty_index() {
        let index = DirectoryIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.generation(), 0);
        assert!(index.lookup(&key("+15550000001")).is_none());
    }

    #[test]
    fn test_publish_orders_registered_first() {
        let index = DirectoryIndex::default();
        index.publish(vec![
            contact("+15550000001", "Aaron"),
            registered("+15550000002", "Zoe"),
            contact("+15550000003", "bea"),
        ]);
        assert_eq!(names(&index), vec!["+15550000002", "+15550000001", "+15550000003"]);
        assert_eq!(index.snapshot().registered().count(), 1);
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let index = DirectoryIndex::default();
        index.publish(vec![contact("+15550000001", "A"), contact("+15550000002", "B")]);
        index.publish(vec![contact("+15550000003", "C")]);
        assert_eq!(index.len(), 1);
        assert!(index.lookup(&key("+15550000001")).is_none());
        assert_eq!(index.generation(), 2);
    }

    #[test]
    fn test_duplicates_dropped_first_wins() {
        let index = DirectoryIndex::default();
        let report = index.publish(vec![contact("+15550000001", "First"), contact("+15550000001", "Second")]);
        assert_eq!(report.published, 1);
        assert_eq!(report.dropped, 1);
        let entry = index.lookup(&key("+15550000001")).unwrap();
        assert_eq!(entry.contact().unwrap().given_name, "First");
    }

    #[test]
    fn test_failed_records_do_not_abort_publish() {
        let index = DirectoryIndex::default();
        let bad = Err(SourceError::MergeConflict {
            key: "x".into(),
            reason: "bad".into(),
        });
        let report = index.publish_results(vec![Ok(contact("+15550000001", "A")), bad]);
        assert_eq!(report.published, 1);
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_snapshot_survives_later_publish() {
        let index = DirectoryIndex::default();
        index.publish(vec![contact("+15550000001", "A"), contact("+15550000002", "B")]);
        let before = index.ordered_entries();
        index.publish(Vec::new());
        assert_eq!(before.len(), 2);
        assert!(index.ordered_entries().is_empty());
    }

    #[test]
    fn test_concurrent_publish_readers_see_whole_snapshots() {
        let index = Arc::new(DirectoryIndex::default());
        let sets: Vec<Vec<DirectoryEntry>> = (0..4)
            .map(|set| {
                (0..=set)
                    .map(|i| contact(&format!("+1555000{set}{i:03}"), &format!("n{i}")))
                    .collect()
            })
            .collect();

        let writers: Vec<_> = sets
            .into_iter()
            .map(|set| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        index.publish(set.clone());
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            let snap = index.snapshot();
            // Every writer uses its own key prefix and set size, so a
            // consistent snapshot has one prefix and as many entries as map keys.
            assert_eq!(snap.ordered().len(), snap.by_key.len());
            let prefixes: std::collections::HashSet<_> =
                snap.ordered().iter().map(|e| e.key().as_str()[..9].to_string()).collect();
            assert!(prefixes.len() <= 1);
        }

        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(index.generation(), 200);
    }
}
