//! Recording playback gateway for testing.
//!
//! Records every sound reference passed to [`PlaybackGateway::play`] instead
//! of starting a player, so tests can assert exactly which sounds a scenario
//! played and how many times.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::{PlaybackError, PlaybackGateway};

/// A [`PlaybackGateway`] that only remembers what it was asked to play.
#[derive(Debug, Default)]
pub struct RecordingPlaybackGateway {
    played: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingPlaybackGateway {
    /// Creates a gateway whose `play` always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway whose `play` records the call and then reports
    /// [`PlaybackError::NotFound`].
    pub fn failing() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Sound references played so far, in call order.
    pub fn played(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `play` calls so far.
    pub fn play_count(&self) -> usize {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PlaybackGateway for RecordingPlaybackGateway {
    fn play(&self, sound_ref: &str) -> Result<(), PlaybackError> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sound_ref.to_string());
        if self.fail {
            return Err(PlaybackError::NotFound(PathBuf::from(sound_ref)));
        }
        Ok(())
    }
}
