//! Configuration for the conversation engine.
//!
//! # Example
//!
//! ```
//! use conversation_core::EngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = EngineConfig::default();
//! assert_eq!(config.media_cache_max_bytes, 64 * 1024 * 1024); // 64 MB
//!
//! // Override a few fields
//! let config = EngineConfig {
//!     media_cache_max_entries: 16,
//!     evict_unreferenced_media: false,
//!     ..Default::default()
//! };
//! assert_eq!(config.media_limits().max_entries, 16);
//!
//! // Or from JSON; missing fields take their defaults
//! let config = EngineConfig::from_json_str(r#"{ "default_country_code": "44" }"#).unwrap();
//! assert_eq!(config.avatar_cache_max_entries, 256);
//! ```

use serde::Deserialize;

use crate::eviction::CacheLimits;

/// Configuration for the conversation engine.
///
/// All fields have defaults. A zero cache bound means unbounded in that
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Avatar cache max entries (default: 256)
    #[serde(default = "default_avatar_cache_max_entries")]
    pub avatar_cache_max_entries: usize,

    /// Avatar cache max decoded bytes (default: 16 MB)
    #[serde(default = "default_avatar_cache_max_bytes")]
    pub avatar_cache_max_bytes: usize,

    /// Cell media cache max entries (default: 64)
    #[serde(default = "default_media_cache_max_entries")]
    pub media_cache_max_entries: usize,

    /// Cell media cache max bytes (default: 64 MB)
    #[serde(default = "default_media_cache_max_bytes")]
    pub media_cache_max_bytes: usize,

    /// Drop media from the shared cache as soon as no visible cell holds it.
    /// When false, released media stays until LRU or pressure removes it.
    #[serde(default = "default_evict_unreferenced_media")]
    pub evict_unreferenced_media: bool,

    /// Buffer for directory-changed and cell-transition broadcasts
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// Country code assumed for bare national numbers when formatting keys
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

fn default_avatar_cache_max_entries() -> usize { 256 }
fn default_avatar_cache_max_bytes() -> usize { 16 * 1024 * 1024 } // 16 MB
fn default_media_cache_max_entries() -> usize { 64 }
fn default_media_cache_max_bytes() -> usize { 64 * 1024 * 1024 } // 64 MB
fn default_evict_unreferenced_media() -> bool { true }
fn default_notification_capacity() -> usize { 16 }
fn default_country_code() -> String { "1".into() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            avatar_cache_max_entries: default_avatar_cache_max_entries(),
            avatar_cache_max_bytes: default_avatar_cache_max_bytes(),
            media_cache_max_entries: default_media_cache_max_entries(),
            media_cache_max_bytes: default_media_cache_max_bytes(),
            evict_unreferenced_media: default_evict_unreferenced_media(),
            notification_capacity: default_notification_capacity(),
            default_country_code: default_country_code(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn avatar_limits(&self) -> CacheLimits {
        CacheLimits::new(self.avatar_cache_max_entries, self.avatar_cache_max_bytes)
    }

    #[must_use]
    pub fn media_limits(&self) -> CacheLimits {
        CacheLimits::new(self.media_cache_max_entries, self.media_cache_max_bytes)
    }
}
