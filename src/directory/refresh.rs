// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Directory refresh: fetch contacts, look up accounts, merge, publish,
//! notify.
//!
//! At most one refresh runs at a time. A request that arrives while one is
//! in flight waits for that refresh's outcome instead of starting another.
//! The refresh itself runs on a spawned task so a waiter going away does
//! not cancel it; [`RefreshController::cancel`] does.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use super::{DirectoryIndex, PublishReport};
use crate::identity::{AccountRecord, ContactRecord, DirectoryEntry, IdentityKey};
use crate::metrics::LatencyTimer;
use crate::sources::traits::{AccountRegistry, Authorization, ContactSource, SourceError};

/// Broadcast after a publish is visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryChanged;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("refresh cancelled")]
    Cancelled,

    #[error("refresh controller is shut down")]
    ShuttingDown,
}

impl DirectoryError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Source(SourceError::PermissionDenied) => "permission_denied",
            Self::Source(SourceError::Unavailable(_)) => "unavailable",
            Self::Source(SourceError::DecodeFailure { .. }) => "decode",
            Self::Source(SourceError::MergeConflict { .. }) => "merge_conflict",
            Self::Cancelled => "cancelled",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A refresh ran (or was joined) and published.
    Published(PublishReport),
    /// `request_refresh_once` after a successful refresh.
    AlreadyComplete,
    /// Contact access not granted; nothing fetched.
    Skipped,
}

type SharedOutcome = Option<Result<PublishReport, DirectoryError>>;

struct InFlight {
    id: u64,
    outcome: watch::Receiver<SharedOutcome>,
    abort: AbortHandle,
}

#[derive(Default)]
struct RefreshState {
    in_flight: Option<InFlight>,
    completed_once: bool,
    shut_down: bool,
    next_id: u64,
}

struct Inner {
    contacts: Arc<dyn ContactSource>,
    registry: Arc<dyn AccountRegistry>,
    index: Arc<DirectoryIndex>,
    changed: broadcast::Sender<DirectoryChanged>,
    state: Mutex<RefreshState>,
}

/// Owns fetching and republishing the directory.
#[derive(Clone)]
pub struct RefreshController {
    inner: Arc<Inner>,
}

impl RefreshController {
    pub fn new(
        contacts: Arc<dyn ContactSource>,
        registry: Arc<dyn AccountRegistry>,
        index: Arc<DirectoryIndex>,
        notification_capacity: usize,
    ) -> Self {
        let (changed, _) = broadcast::channel(notification_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                contacts,
                registry,
                index,
                changed,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// Receive a [`DirectoryChanged`] after every publish.
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryChanged> {
        self.inner.changed.subscribe()
    }

    #[must_use]
    pub fn index(&self) -> &Arc<DirectoryIndex> {
        &self.inner.index
    }

    #[must_use]
    pub fn authorization(&self) -> Authorization {
        self.inner.contacts.authorization()
    }

    /// Fetch once per process lifetime. A no-op after the first success;
    /// failures leave the next call free to try again.
    #[instrument(skip(self))]
    pub async fn request_refresh_once(&self) -> Result<RefreshOutcome, DirectoryError> {
        self.run(true).await
    }

    /// Fetch now, joining an in-flight refresh if there is one.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<RefreshOutcome, DirectoryError> {
        self.run(false).await
    }

    /// Fetch only if contact access is already granted. Never prompts.
    #[instrument(skip(self))]
    pub async fn refresh_if_authorized(&self) -> Result<RefreshOutcome, DirectoryError> {
        match self.inner.contacts.authorization() {
            Authorization::Authorized => self.run(false).await,
            other => {
                debug!(authorization = ?other, "Contact access not granted, skipping refresh");
                crate::metrics::record_refresh("skipped");
                Ok(RefreshOutcome::Skipped)
            }
        }
    }

    /// Abort the in-flight refresh, if any. Waiters get
    /// [`DirectoryError::Cancelled`] and the index keeps its current
    /// snapshot. Returns whether a refresh was in flight.
    pub fn cancel(&self) -> bool {
        let in_flight = self.inner.state.lock().in_flight.take();
        match in_flight {
            Some(in_flight) => {
                in_flight.abort.abort();
                info!(refresh = in_flight.id, "Directory refresh cancelled");
                crate::metrics::record_refresh("cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel any refresh and refuse later ones.
    pub fn shutdown(&self) {
        self.inner.state.lock().shut_down = true;
        self.cancel();
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Whether any refresh has published since construction.
    #[must_use]
    pub fn has_completed(&self) -> bool {
        self.inner.state.lock().completed_once
    }

    async fn run(&self, once: bool) -> Result<RefreshOutcome, DirectoryError> {
        let mut outcome = {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return Err(DirectoryError::ShuttingDown);
            }
            if once && state.completed_once {
                return Ok(RefreshOutcome::AlreadyComplete);
            }
            let joined = state.in_flight.as_ref().map(|in_flight| {
                debug!(refresh = in_flight.id, "Joining in-flight directory refresh");
                crate::metrics::record_refresh_coalesced();
                in_flight.outcome.clone()
            });
            match joined {
                Some(outcome) => outcome,
                None => self.start(&mut state),
            }
        };

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Err(DirectoryError::Cancelled)),
            Err(_) => Err(DirectoryError::Cancelled),
        };
        result.map(RefreshOutcome::Published)
    }

    /// Spawn a refresh. Called with the state lock held so only one starts.
    fn start(&self, state: &mut RefreshState) -> watch::Receiver<SharedOutcome> {
        state.next_id += 1;
        let id = state.next_id;
        let (tx, rx) = watch::channel(None);

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let result = inner.fetch_and_publish(id).await;
            {
                let mut state = inner.state.lock();
                if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
                    state.in_flight = None;
                }
                if result.is_ok() {
                    state.completed_once = true;
                }
            }
            tx.send_replace(Some(result));
        });

        state.in_flight = Some(InFlight {
            id,
            outcome: rx.clone(),
            abort: task.abort_handle(),
        });
        rx
    }
}

impl Inner {
    #[instrument(skip(self), fields(generation = tracing::field::Empty))]
    async fn fetch_and_publish(&self, refresh: u64) -> Result<PublishReport, DirectoryError> {
        let _timer = LatencyTimer::new("directory", "refresh");

        let result = async {
            let contacts = self.contacts.fetch_contacts().await?;
            let keys = collect_keys(&contacts);
            let accounts = self.registry.lookup_accounts(&keys).await?;
            Ok::<_, SourceError>(merge_records(contacts, accounts))
        }
        .await;

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                let e = DirectoryError::from(e);
                warn!(error = %e, "Directory refresh failed, keeping current snapshot");
                crate::metrics::record_refresh("failed");
                crate::metrics::record_error("directory", "refresh", e.kind());
                return Err(e);
            }
        };

        // Publish and notify with no await in between: an abort cannot
        // separate the two.
        let report = self.index.publish_results(records);
        let _ = self.changed.send(DirectoryChanged);

        tracing::Span::current().record("generation", report.generation);
        info!(
            published = report.published,
            dropped = report.dropped,
            "Directory refreshed"
        );
        crate::metrics::record_refresh("published");
        Ok(report)
    }
}

/// Distinct keys across all contacts, in first-seen order.
fn collect_keys(contacts: &[ContactRecord]) -> Vec<IdentityKey> {
    let mut seen = HashSet::new();
    contacts
        .iter()
        .flat_map(|c| c.keys.iter())
        .filter(|k| seen.insert((*k).clone()))
        .cloned()
        .collect()
}

/// Outer join of contacts and accounts by key.
///
/// One record per (contact, key) pair plus one per account no contact
/// lists. A contact with no keys yields a merge conflict.
pub(crate) fn merge_records(
    contacts: Vec<ContactRecord>,
    mut accounts: HashMap<IdentityKey, AccountRecord>,
) -> Vec<Result<DirectoryEntry, SourceError>> {
    let mut records = Vec::with_capacity(contacts.len() + accounts.len());

    for contact in contacts {
        if contact.keys.is_empty() {
            records.push(Err(SourceError::MergeConflict {
                key: contact.full_name(),
                reason: "contact lists no identity keys".into(),
            }));
            continue;
        }
        let contact = Arc::new(contact);
        for key in &contact.keys {
            let account = accounts.remove(key).map(Arc::new);
            records.push(DirectoryEntry::merge(key.clone(), Some(contact.clone()), account));
        }
    }

    for (key, account) in accounts {
        records.push(DirectoryEntry::merge(key, None, Some(Arc::new(account))));
    }
    records
}
