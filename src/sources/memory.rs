//! In-memory collaborators.
//!
//! Good enough for embedding the crate without a real address book or
//! registry, and used throughout the tests. Every implementation counts its
//! calls and can be told to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::traits::{AccountRegistry, Authorization, ContactSource, ImageDecoder, MediaLoader, SourceError};
use crate::identity::{AccountRecord, ContactRecord, IdentityKey, Image, ImageRef};
use crate::media::{CellMediaEntry, ContentId};

/// Address book held in memory.
pub struct InMemoryContactSource {
    contacts: RwLock<Vec<ContactRecord>>,
    authorization: RwLock<Authorization>,
    /// What a prompt resolves to when authorization is `NotDetermined`
    prompt_response: Authorization,
    fail_next: Mutex<Option<SourceError>>,
    fetches: AtomicUsize,
}

impl InMemoryContactSource {
    #[must_use]
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        Self {
            contacts: RwLock::new(contacts),
            authorization: RwLock::new(Authorization::Authorized),
            prompt_response: Authorization::Authorized,
            fail_next: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Start undetermined; the first fetch "prompts" and resolves to `response`.
    #[must_use]
    pub fn undetermined(contacts: Vec<ContactRecord>, response: Authorization) -> Self {
        let source = Self::new(contacts);
        *source.authorization.write() = Authorization::NotDetermined;
        Self {
            prompt_response: response,
            ..source
        }
    }

    pub fn set_authorization(&self, authorization: Authorization) {
        *self.authorization.write() = authorization;
    }

    pub fn set_contacts(&self, contacts: Vec<ContactRecord>) {
        *self.contacts.write() = contacts;
    }

    /// Make the next fetch fail with `error`.
    pub fn fail_next(&self, error: SourceError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Number of fetches that reached the source.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ContactSource for InMemoryContactSource {
    fn authorization(&self) -> Authorization {
        *self.authorization.read()
    }

    async fn fetch_contacts(&self) -> Result<Vec<ContactRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::AcqRel);

        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }

        let authorization = {
            let mut current = self.authorization.write();
            if *current == Authorization::NotDetermined {
                *current = self.prompt_response;
            }
            *current
        };
        match authorization {
            Authorization::Authorized => Ok(self.contacts.read().clone()),
            Authorization::Denied | Authorization::NotDetermined => Err(SourceError::PermissionDenied),
        }
    }
}

/// Account registry held in memory.
///
/// Lookups return the accounts for the requested keys plus every other
/// account the registry knows, so accounts without a local contact still
/// reach the directory.
#[derive(Default)]
pub struct InMemoryAccountRegistry {
    accounts: DashMap<IdentityKey, AccountRecord>,
    fail_next: Mutex<Option<SourceError>>,
    lookups: AtomicUsize,
}

impl InMemoryAccountRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: AccountRecord) {
        self.accounts.insert(account.key.clone(), account);
    }

    pub fn remove(&self, key: &IdentityKey) {
        self.accounts.remove(key);
    }

    pub fn fail_next(&self, error: SourceError) {
        *self.fail_next.lock() = Some(error);
    }

    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AccountRegistry for InMemoryAccountRegistry {
    async fn lookup_accounts(
        &self,
        _keys: &[IdentityKey],
    ) -> Result<HashMap<IdentityKey, AccountRecord>, SourceError> {
        self.lookups.fetch_add(1, Ordering::AcqRel);
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        Ok(self
            .accounts
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect())
    }
}

/// Decoder over a fixed table of images. Unknown references fail to decode.
#[derive(Default)]
pub struct InMemoryImageDecoder {
    images: DashMap<String, Image>,
    decodes: AtomicUsize,
}

impl InMemoryImageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, image: &ImageRef, decoded: Image) {
        self.images.insert(image.as_str().to_string(), decoded);
    }

    #[must_use]
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::Acquire)
    }
}

impl ImageDecoder for InMemoryImageDecoder {
    fn decode(&self, image: &ImageRef) -> Result<Image, SourceError> {
        self.decodes.fetch_add(1, Ordering::AcqRel);
        self.images
            .get(image.as_str())
            .map(|r| r.value().clone())
            .ok_or_else(|| SourceError::DecodeFailure {
                reference: image.as_str().to_string(),
                reason: "no image data".into(),
            })
    }
}

/// Media loader over a fixed table of payloads, with an optional delay to
/// simulate decode work.
#[derive(Default)]
pub struct InMemoryMediaLoader {
    media: DashMap<ContentId, CellMediaEntry>,
    delay: Option<Duration>,
    loads: AtomicUsize,
}

impl InMemoryMediaLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn insert(&self, content: ContentId, entry: CellMediaEntry) {
        self.media.insert(content, entry);
    }

    pub fn remove(&self, content: &ContentId) {
        self.media.remove(content);
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MediaLoader for InMemoryMediaLoader {
    async fn load(&self, content: &ContentId) -> Result<CellMediaEntry, SourceError> {
        self.loads.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.media
            .get(content)
            .map(|r| r.value().clone())
            .ok_or_else(|| SourceError::DecodeFailure {
                reference: content.to_string(),
                reason: "no media for content".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::SizedItem;

    fn key(raw: &str) -> IdentityKey {
        IdentityKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_contact_source_counts_fetches() {
        let source = InMemoryContactSource::new(vec![ContactRecord::new("Alice", "", vec![key("+1555")])]);
        assert_eq!(source.fetch_contacts().await.unwrap().len(), 1);
        assert_eq!(source.fetch_contacts().await.unwrap().len(), 1);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_contact_source_denied() {
        let source = InMemoryContactSource::new(vec![]);
        source.set_authorization(Authorization::Denied);
        assert_eq!(source.fetch_contacts().await, Err(SourceError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_contact_source_prompt_resolves() {
        let source = InMemoryContactSource::undetermined(vec![], Authorization::Authorized);
        assert_eq!(source.authorization(), Authorization::NotDetermined);
        assert!(source.fetch_contacts().await.is_ok());
        assert_eq!(source.authorization(), Authorization::Authorized);

        let refused = InMemoryContactSource::undetermined(vec![], Authorization::Denied);
        assert_eq!(refused.fetch_contacts().await, Err(SourceError::PermissionDenied));
        assert_eq!(refused.authorization(), Authorization::Denied);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let source = InMemoryContactSource::new(vec![]);
        source.fail_next(SourceError::Unavailable("offline".into()));
        assert!(source.fetch_contacts().await.is_err());
        assert!(source.fetch_contacts().await.is_ok());
    }

    #[tokio::test]
    async fn test_registry_returns_known_accounts() {
        let registry = InMemoryAccountRegistry::new();
        registry.insert(AccountRecord::registered(key("+1555")));
        let found = registry.lookup_accounts(&[key("+1555")]).await.unwrap();
        assert!(found.contains_key(&key("+1555")));
        assert_eq!(registry.lookup_count(), 1);
    }

    #[test]
    fn test_decoder_unknown_reference_fails() {
        let decoder = InMemoryImageDecoder::new();
        let result = decoder.decode(&ImageRef::new("missing"));
        assert!(matches!(result, Err(SourceError::DecodeFailure { .. })));
        assert_eq!(decoder.decode_count(), 1);
    }

    #[tokio::test]
    async fn test_media_loader_round_trip() {
        let loader = InMemoryMediaLoader::new();
        let content = ContentId::new("attachment-1");
        loader.insert(content.clone(), CellMediaEntry::new(vec![1, 2, 3]));
        assert_eq!(loader.load(&content).await.unwrap().size_bytes(), 3);
        assert!(loader.load(&ContentId::new("other")).await.is_err());
        assert_eq!(loader.load_count(), 2);
    }
}
