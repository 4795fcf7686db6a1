//! Public types for the conversation engine coordinator.

use crate::eviction::CacheStats;

/// Engine lifecycle state.
///
/// Use [`super::ConversationEngine::state()`] to check the current state or
/// [`super::ConversationEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, not yet started
    Created,
    /// Initial fetch-if-authorized in progress
    Starting,
    /// Serving reads and signals
    Ready,
    /// Cancelling refresh and releasing media
    ShuttingDown,
    /// Torn down; signals are ignored
    Stopped,
}

impl EngineState {
    /// Whether signals and refreshes are still accepted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::Ready => write!(f, "Ready"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Point-in-time statistics for both caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub avatars: CacheStats,
    pub media: CacheStats,
    /// Published directory entries
    pub directory_entries: usize,
    /// Cells the lifecycle controller knows about
    pub cells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_state_display() {
        assert_eq!(format!("{}", EngineState::Created), "Created");
        assert_eq!(format!("{}", EngineState::Ready), "Ready");
        assert_eq!(format!("{}", EngineState::Stopped), "Stopped");
    }

    #[test]
    fn test_is_live() {
        assert!(EngineState::Created.is_live());
        assert!(EngineState::Ready.is_live());
        assert!(!EngineState::ShuttingDown.is_live());
        assert!(!EngineState::Stopped.is_live());
    }
}
