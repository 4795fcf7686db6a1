//! Pluggable contacts manager.
//!
//! Consumers that only need names, avatars and a way to ask for a refresh
//! depend on [`ContactsManager`], so tests can hand them a double instead of
//! a full engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::directory::{DirectoryError, RefreshController, RefreshOutcome};
use crate::identity::{IdentityKey, Image};
use crate::resolver::{Resolver, StyleHints, StyledName};

#[async_trait]
pub trait ContactsManager: Send + Sync {
    fn display_name(&self, key: &IdentityKey) -> String;

    fn image(&self, key: &IdentityKey) -> Option<Image>;

    fn formatted_name(&self, key: &IdentityKey, hints: StyleHints) -> StyledName;

    /// Ask for the directory to be loaded if it has not been yet.
    async fn request_refresh(&self) -> Result<RefreshOutcome, DirectoryError>;
}

/// [`ContactsManager`] backed by the system contact source and account
/// registry, through the resolver and refresh controller.
#[derive(Clone)]
pub struct SystemContactsManager {
    resolver: Arc<Resolver>,
    refresh: RefreshController,
}

impl SystemContactsManager {
    pub fn new(resolver: Arc<Resolver>, refresh: RefreshController) -> Self {
        Self { resolver, refresh }
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    #[must_use]
    pub fn refresh_controller(&self) -> &RefreshController {
        &self.refresh
    }
}

#[async_trait]
impl ContactsManager for SystemContactsManager {
    fn display_name(&self, key: &IdentityKey) -> String {
        self.resolver.display_name(key)
    }

    fn image(&self, key: &IdentityKey) -> Option<Image> {
        self.resolver.image(key)
    }

    fn formatted_name(&self, key: &IdentityKey, hints: StyleHints) -> StyledName {
        self.resolver.formatted_name(key, hints)
    }

    async fn request_refresh(&self) -> Result<RefreshOutcome, DirectoryError> {
        self.refresh.request_refresh_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryIndex;
    use crate::eviction::CacheLimits;
    use crate::identity::ContactRecord;
    use crate::resolver::StyledSpan;
    use crate::sources::memory::{InMemoryAccountRegistry, InMemoryContactSource, InMemoryImageDecoder};

    /// Stand-in that knows every name as "Test".
    struct FixedNames;

    #[async_trait]
    impl ContactsManager for FixedNames {
        fn display_name(&self, _key: &IdentityKey) -> String {
            "Test".into()
        }

        fn image(&self, _key: &IdentityKey) -> Option<Image> {
            None
        }

        fn formatted_name(&self, key: &IdentityKey, _hints: StyleHints) -> StyledName {
            StyledName {
                spans: vec![StyledSpan {
                    text: self.display_name(key),
                    emphasized: false,
                }],
            }
        }

        async fn request_refresh(&self) -> Result<RefreshOutcome, DirectoryError> {
            Ok(RefreshOutcome::AlreadyComplete)
        }
    }

    async fn title(manager: &dyn ContactsManager, key: &IdentityKey) -> String {
        let _ = manager.request_refresh().await;
        manager.display_name(key)
    }

    #[tokio::test]
    async fn test_system_manager_resolves_after_refresh() {
        let key = IdentityKey::parse("+15551230000").unwrap();
        let index = Arc::new(DirectoryIndex::default());
        let source = Arc::new(InMemoryContactSource::new(vec![ContactRecord::new("Alice", "", vec![key.clone()])]));
        let refresh = RefreshController::new(source, Arc::new(InMemoryAccountRegistry::new()), index.clone(), 4);
        let resolver = Arc::new(Resolver::new(index, Arc::new(InMemoryImageDecoder::new()), CacheLimits::unbounded()));
        let manager = SystemContactsManager::new(resolver, refresh);

        assert_eq!(manager.display_name(&key), "+1 555-123-0000");
        assert_eq!(title(&manager, &key).await, "Alice");
    }

    #[tokio::test]
    async fn test_double_substitutes() {
        let key = IdentityKey::parse("+15551230000").unwrap();
        assert_eq!(title(&FixedNames, &key).await, "Test");
    }
}
