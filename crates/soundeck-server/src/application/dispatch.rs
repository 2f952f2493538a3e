//! Dispatcher: turns a trigger into at most one playback request.
//!
//! Both trigger producers, the key listener thread and every app session,
//! call into the same [`Dispatcher`] through the [`TriggerSink`] trait.  Each
//! call reads the latest configuration snapshot, resolves the trigger with
//! `soundeck_core::resolver`, and asks the [`PlaybackGateway`] to play the
//! result.  Playback failures are logged and swallowed; the producer never
//! learns about them and never waits for the sound to finish.

use std::sync::Arc;

use soundeck_core::{resolver, Trigger};
use tracing::{debug, info, warn};

use crate::infrastructure::playback::PlaybackGateway;
use crate::infrastructure::storage::ConfigStore;

/// Receives triggers from a producer.
///
/// Implementations must return quickly: the key listener calls this from its
/// capture thread and sessions call it from their async task.
pub trait TriggerSink: Send + Sync {
    fn on_trigger(&self, trigger: Trigger);
}

/// Result of dispatching one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Playback of this sound reference was started.
    Played(String),
    /// No binding with a sound matches the trigger.
    Unbound,
    /// A binding matched but the gateway refused to play it.
    PlaybackFailed,
}

/// Resolves triggers against the current document and starts playback.
pub struct Dispatcher {
    store: Arc<ConfigStore>,
    playback: Arc<dyn PlaybackGateway>,
}

impl Dispatcher {
    pub fn new(store: Arc<ConfigStore>, playback: Arc<dyn PlaybackGateway>) -> Self {
        Self { store, playback }
    }

    /// Resolves `trigger` and calls the playback gateway at most once.
    pub fn dispatch(&self, trigger: Trigger) -> DispatchOutcome {
        let doc = self.store.snapshot();
        let Some(sound) = resolver::resolve(&doc, &trigger) else {
            debug!("{trigger}: no sound bound");
            return DispatchOutcome::Unbound;
        };

        match self.playback.play(sound) {
            Ok(()) => {
                info!("{trigger}: playing {sound}");
                DispatchOutcome::Played(sound.to_string())
            }
            Err(e) => {
                warn!("{trigger}: {e}");
                DispatchOutcome::PlaybackFailed
            }
        }
    }
}

impl TriggerSink for Dispatcher {
    fn on_trigger(&self, trigger: Trigger) {
        self.dispatch(trigger);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
