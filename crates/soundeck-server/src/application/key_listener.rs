//! KeyListener: the background hardware-key listener.
//!
//! Owns an [`InputSource`] and a dedicated `soundeck-keys` OS thread.  The
//! thread drains the source's channel, maps each key-down through the
//! platform keymap (`soundeck_core::translate`), and hands recognised keys to
//! the [`TriggerSink`] as [`Trigger::Key`].  Key-ups and unrecognised keys are
//! dropped.
//!
//! # Stop semantics
//!
//! [`KeyListener::stop`] clears the running flag, stops the source and joins
//! the thread.  A callback that is already running finishes first; none starts
//! after `stop()` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use soundeck_core::{translate, Trigger};
use tracing::{debug, info, warn};

use crate::application::dispatch::TriggerSink;
use crate::infrastructure::input_capture::{CaptureError, InputSource, RawInputEvent};

/// How often the worker re-checks the running flag while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Background listener forwarding recognised key presses to a sink.
pub struct KeyListener {
    source: Box<dyn InputSource>,
    sink: Arc<dyn TriggerSink>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl KeyListener {
    pub fn new(source: Box<dyn InputSource>, sink: Arc<dyn TriggerSink>) -> Self {
        Self {
            source,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Starts capture and the worker thread; returns once capture is active.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyRunning`] when called twice without `stop()`,
    /// or whatever the input source reports.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let events = self.source.start()?;
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let sink = Arc::clone(&self.sink);
        let spawned = thread::Builder::new()
            .name("soundeck-keys".to_string())
            .spawn(move || run_worker(events, sink, running));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!("key listener started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.source.stop();
                Err(CaptureError::HookInstallFailed(e.to_string()))
            }
        }
    }

    /// Stops capture and waits for the worker thread to exit.
    pub fn stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        self.source.stop();
        if handle.join().is_err() {
            warn!("key listener thread panicked");
        }
        info!("key listener stopped");
    }

    /// Whether the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(events: Receiver<RawInputEvent>, sink: Arc<dyn TriggerSink>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        let code = match events.recv_timeout(POLL_INTERVAL) {
            Ok(RawInputEvent::KeyDown { code }) => code,
            Ok(RawInputEvent::KeyUp { .. }) | Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("input source closed its channel");
                break;
            }
        };

        let Some(key) = translate(code) else {
            continue;
        };
        if running.load(Ordering::SeqCst) {
            debug!("key down: {key}");
            sink.on_trigger(Trigger::Key(key));
        }
    }
    running.store(false, Ordering::SeqCst);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
