//! Sound playback through an external player program.
//!
//! The dispatcher only knows the [`PlaybackGateway`] capability: "play this
//! sound reference, and don't make me wait".  [`CommandPlaybackGateway`] is
//! the production implementation.  It resolves the reference to a file and
//! hands it to a player process (`aplay`, `afplay`, PowerShell's
//! `Media.SoundPlayer`, or whatever `--player` names) on a detached thread.
//!
//! # Non-blocking contract
//!
//! `play` returns as soon as the player thread is spawned.  The thread waits
//! for the player to exit and logs the outcome, so a hung or slow player never
//! stalls a key press or an app session.
//!
//! # Testability
//!
//! [`mock::RecordingPlaybackGateway`] records every call for integration
//! tests; unit tests use the `mockall`-generated `MockPlaybackGateway`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use soundeck_core::domain::document::DEFAULT_AUDIO_DEVICE;
use thiserror::Error;
use tracing::{debug, warn};

pub mod mock;

/// Placeholder replaced by the resolved file path in player arguments.
///
/// When no argument contains it, the path is appended as the last argument.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Error type for playback requests.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The resolved sound file does not exist.
    #[error("sound file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The playback thread could not be started.
    #[error("failed to start playback thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Capability to start playing a sound.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackGateway: Send + Sync {
    /// Starts playing `sound_ref` and returns without waiting for it to end.
    ///
    /// # Errors
    ///
    /// [`PlaybackError`] when playback could not be started.
    fn play(&self, sound_ref: &str) -> Result<(), PlaybackError>;
}

// ── Player command ────────────────────────────────────────────────────────────

/// Program and arguments used to play one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The player shipped with the host OS.
    pub fn platform_default() -> Self {
        #[cfg(target_os = "windows")]
        {
            Self::new(
                "powershell",
                vec![
                    "-NoProfile".to_string(),
                    "-NonInteractive".to_string(),
                    "-Command".to_string(),
                    format!("(New-Object Media.SoundPlayer '{FILE_PLACEHOLDER}').PlaySync()"),
                ],
            )
        }

        #[cfg(target_os = "macos")]
        {
            Self::new("afplay", Vec::new())
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Self::new("aplay", vec!["-q".to_string()])
        }
    }

    /// Arguments for `file`, with the placeholder substituted or the path
    /// appended.
    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        if self.args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(FILE_PLACEHOLDER, &file))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(file.into_owned());
            args
        }
    }

    fn command_for(&self, file: &Path, audio_device: Option<&str>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.args_for(file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(device) = audio_device {
            command.env("AUDIODEV", device);
        }
        command
    }
}

// ── Command gateway ───────────────────────────────────────────────────────────

/// Plays sound files by running an external player per request.
#[derive(Debug, Clone)]
pub struct CommandPlaybackGateway {
    base_dir: PathBuf,
    player: PlayerCommand,
    audio_device: Option<String>,
}

impl CommandPlaybackGateway {
    /// Creates a gateway resolving relative references against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, player: PlayerCommand) -> Self {
        Self {
            base_dir: base_dir.into(),
            player,
            audio_device: None,
        }
    }

    /// Selects an output device; `"Default"` (or empty) keeps the system one.
    pub fn with_audio_device(mut self, device: &str) -> Self {
        self.audio_device = (!device.is_empty() && device != DEFAULT_AUDIO_DEVICE)
            .then(|| device.to_string());
        self
    }

    /// Absolute path a sound reference points at.
    pub fn resolve_path(&self, sound_ref: &str) -> PathBuf {
        let path = Path::new(sound_ref);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl PlaybackGateway for CommandPlaybackGateway {
    fn play(&self, sound_ref: &str) -> Result<(), PlaybackError> {
        let file = self.resolve_path(sound_ref);
        if !file.is_file() {
            return Err(PlaybackError::NotFound(file));
        }

        let mut command = self.player.command_for(&file, self.audio_device.as_deref());
        let program = self.player.program.clone();
        thread::Builder::new()
            .name("soundeck-playback".to_string())
            .spawn(move || match command.status() {
                Ok(status) if status.success() => debug!("finished {}", file.display()),
                Ok(status) => warn!("{program} exited with {status} playing {}", file.display()),
                Err(e) => warn!("failed to run {program}: {e}"),
            })
            .map_err(PlaybackError::Spawn)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
