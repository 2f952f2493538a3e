//! Mock input source for testing.
//!
//! Lets tests script key presses as [`RawInputEvent`]s; no keyboard hook or
//! readable `/dev/input` device is involved.

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex, PoisonError,
};

use soundeck_core::RawKeyCode;

use super::{CaptureError, InputSource, RawInputEvent};

/// Scripted [`InputSource`] for tests.
///
/// Cloning shares the underlying channel, so a test can keep one handle for
/// injecting while the key listener owns the other.
#[derive(Clone)]
pub struct MockInputSource {
    sender: Arc<Mutex<Option<Sender<RawInputEvent>>>>,
    fail_start: bool,
}

impl MockInputSource {
    /// Creates a source that starts normally.
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            fail_start: false,
        }
    }

    /// Creates a source whose `start()` fails, as a missing hook would.
    pub fn failing() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            fail_start: true,
        }
    }

    /// Sends `event` to the current receiver.
    ///
    /// Returns `false` when the source is not started or the receiver is gone.
    pub fn inject_event(&self, event: RawInputEvent) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Some(ref sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Injects a key-down followed by a key-up for `code`.
    pub fn tap(&self, code: RawKeyCode) -> bool {
        self.inject_event(RawInputEvent::KeyDown { code })
            && self.inject_event(RawInputEvent::KeyUp { code })
    }

    /// Whether `start()` has been called without a matching `stop()`.
    pub fn is_started(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        if self.fail_start {
            return Err(CaptureError::HookInstallFailed("mock failure".to_string()));
        }
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let (tx, rx) = mpsc::channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
