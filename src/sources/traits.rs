use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::{AccountRecord, ContactRecord, IdentityKey, Image, ImageRef};
use crate::media::{CellMediaEntry, ContentId};

/// Failures reported by external collaborators.
///
/// None of these are fatal: callers degrade to placeholder names, missing
/// images or empty cell content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("contact access not granted")]
    PermissionDenied,
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("decode failed for '{reference}': {reason}")]
    DecodeFailure { reference: String, reason: String },
    #[error("malformed record for '{key}': {reason}")]
    MergeConflict { key: String, reason: String },
}

/// Whether the user has granted access to the local contact source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Never asked; fetching may prompt.
    NotDetermined,
    Denied,
    Authorized,
}

/// Local contact source (the system address book).
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// Current authorization, without prompting.
    fn authorization(&self) -> Authorization;

    async fn fetch_contacts(&self) -> Result<Vec<ContactRecord>, SourceError>;
}

/// Remote account registry.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Look up accounts for `keys`.
    ///
    /// Keys with no account are simply absent from the result. The registry
    /// may also return accounts for keys it knows about that were not asked for.
    async fn lookup_accounts(
        &self,
        keys: &[IdentityKey],
    ) -> Result<HashMap<IdentityKey, AccountRecord>, SourceError>;
}

/// Raw image decoder used for avatars.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, image: &ImageRef) -> Result<Image, SourceError>;
}

/// Produces the expensive payload for a cell's content (decoded media).
#[async_trait]
pub trait MediaLoader: Send + Sync {
    async fn load(&self, content: &ContentId) -> Result<CellMediaEntry, SourceError>;
}
