//! Interfaces to the collaborators this crate consumes, plus in-memory
//! implementations for embedding and tests.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryAccountRegistry, InMemoryContactSource, InMemoryImageDecoder, InMemoryMediaLoader};
pub use traits::{AccountRegistry, Authorization, ContactSource, ImageDecoder, MediaLoader, SourceError};
