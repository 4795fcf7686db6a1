// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Global pressure signals.
//!
//! Cells are cheap to prefetch but their media is not, so media is
//! evacuated whenever the process is told memory is tight or the
//! conversation is no longer on screen.
//!
//! # Example
//!
//! ```
//! use conversation_core::PressureSignal;
//!
//! assert!(PressureSignal::LowMemory.clears_avatars());
//! assert!(!PressureSignal::EnteredBackground.clears_avatars());
//! assert!(PressureSignal::ViewObscured.evacuates_media());
//! ```

/// Reason the host asks the core to shed memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressureSignal {
    /// The OS reported low memory.
    LowMemory,
    /// The app moved to the background.
    EnteredBackground,
    /// Another view (settings, call screen, ...) covers the conversation.
    ViewObscured,
}

impl PressureSignal {
    /// Every signal evacuates cell media.
    #[must_use]
    pub fn evacuates_media(&self) -> bool {
        true
    }

    /// Avatars are tiny and shared across screens; only real memory
    /// pressure drops them.
    #[must_use]
    pub fn clears_avatars(&self) -> bool {
        matches!(self, Self::LowMemory)
    }

    /// Metric/log label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowMemory => "low_memory",
            Self::EnteredBackground => "background",
            Self::ViewObscured => "view_obscured",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LowMemory => "Low memory - all caches cleared",
            Self::EnteredBackground => "Backgrounded - cell media released",
            Self::ViewObscured => "Conversation obscured - cell media released",
        }
    }
}

impl std::fmt::Display for PressureSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
