//! Engine lifecycle management: start, shutdown, visibility pump.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryError, RefreshOutcome};
use crate::media::VisibilityEvent;

use super::{ConversationEngine, EngineState};

impl ConversationEngine {
    /// Start the engine.
    ///
    /// Fetches the directory if contact access is already granted; never
    /// prompts. A failed fetch is returned but the engine still becomes
    /// `Ready` and serves key-only names. Starting a started engine is a
    /// no-op returning [`RefreshOutcome::AlreadyComplete`].
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<RefreshOutcome, DirectoryError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == EngineState::Created {
                *state = EngineState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return match self.state() {
                state if state.is_live() => Ok(RefreshOutcome::AlreadyComplete),
                _ => Err(DirectoryError::ShuttingDown),
            };
        }
        crate::metrics::set_engine_state("Starting");
        info!("Starting conversation engine...");

        let result = self.refresh.refresh_if_authorized().await;
        match result {
            Ok(RefreshOutcome::Skipped) => {
                info!("Contact access not granted, starting with an empty directory");
            }
            Ok(_) => {
                info!(entries = self.index.len(), "Directory loaded");
            }
            Err(ref e) => {
                warn!(error = %e, "Initial directory fetch failed, starting degraded");
            }
        }

        // A shutdown that raced the fetch wins.
        let ready = self.state.send_if_modified(|state| {
            if *state == EngineState::Starting {
                *state = EngineState::Ready;
                true
            } else {
                false
            }
        });
        if ready {
            crate::metrics::set_engine_state("Ready");
        }
        result
    }

    /// Tear down: cancel refresh, abort loads, release media and avatars.
    ///
    /// Idempotent. Readers holding directory snapshots keep them.
    pub fn shutdown(&self) {
        if self.state() == EngineState::Stopped {
            return;
        }
        info!("Initiating conversation engine shutdown...");
        self.set_state(EngineState::ShuttingDown);

        self.refresh.shutdown();
        self.media.shutdown();
        self.resolver.clear_avatars();

        self.set_state(EngineState::Stopped);
        info!("Conversation engine shutdown complete");
    }

    /// Apply visibility events from `events` in order until the channel
    /// closes or the engine stops.
    pub fn spawn_visibility_pump(&self, mut events: mpsc::Receiver<VisibilityEvent>) -> JoinHandle<()> {
        let media = self.media.clone();
        let mut state = self.state_receiver();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        if !state.borrow().is_live() {
                            break;
                        }
                        media.on_visibility_changed(event.cell, event.visible);
                    }
                    changed = state.changed() => {
                        if changed.is_err() || !state.borrow().is_live() {
                            break;
                        }
                    }
                }
            }
            debug!("Visibility pump stopped");
        })
    }
}
