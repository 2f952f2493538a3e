//! Keyboard capture infrastructure for the SounDeck server.
//!
//! On Windows, this installs a low-level keyboard hook (`WH_KEYBOARD_LL`) on
//! a dedicated Win32 message loop thread.  On Linux, it opens every
//! `/dev/input/event*` device that can produce one of the recognised keys and
//! reads it on its own blocking thread.  Either way, raw events are placed into
//! a `std::sync::mpsc` channel and consumed by the key listener thread.
//!
//! # Raw codes, not logical keys
//!
//! Sources report the code their platform uses ([`RawKeyCode`]); translating
//! it to a logical key name is the listener's job, using the tables in
//! `soundeck_core::keymap`.  That keeps the OS-specific code here as small as
//! possible.
//!
//! # Testability
//!
//! The [`InputSource`] trait allows tests to inject synthetic events through
//! [`mock::MockInputSource`] without OS hooks or input devices.

use std::sync::mpsc;

use soundeck_core::RawKeyCode;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

/// A raw keyboard event produced by an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A key went down (auto-repeat is not reported).
    KeyDown { code: RawKeyCode },
    /// A key was released.
    KeyUp { code: RawKeyCode },
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstallFailed(String),
    #[error("no keyboard device exposes a recognised key")]
    NoDevices,
    #[error("permission denied reading input devices: {0}")]
    PermissionDenied(String),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
    #[error("capture is already running")]
    AlreadyRunning,
}

/// Trait abstracting keyboard event production.
///
/// Production implementations use OS facilities; tests use
/// [`mock::MockInputSource`].
pub trait InputSource: Send {
    /// Starts capturing and returns a receiver for captured events.
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError>;
    /// Stops capturing and releases OS resources.
    fn stop(&self);
}

/// Returns the input source for the host platform.
///
/// # Errors
///
/// [`CaptureError::UnsupportedPlatform`] on platforms without a capture
/// implementation.
pub fn platform_input_source() -> Result<Box<dyn InputSource>, CaptureError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsKeyboardHook::new()))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::EvdevInputSource::new()))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        Err(CaptureError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}
