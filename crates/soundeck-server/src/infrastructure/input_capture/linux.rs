//! Linux keyboard capture through evdev.
//!
//! Every `/dev/input/event*` node that can emit at least one recognised key
//! (numeric pad or F5–F8) is opened and read on its own blocking thread.
//! Reading these nodes needs membership in the `input` group (or root).
//!
//! Only key-press events (value `1`) become [`RawInputEvent::KeyDown`];
//! auto-repeat (value `2`) is dropped and releases become `KeyUp`.
//!
//! # Stopping
//!
//! `fetch_events` blocks until the device produces something, so reader
//! threads notice `stop()` on their next event and exit then.  The channel is
//! closed for the consumer immediately: the listener never sees events that
//! arrive after `stop()`.

#![cfg(target_os = "linux")]

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use evdev::{Device, InputEventKind, Key};
use soundeck_core::keymap::linux_evdev::INTERESTING_CODES;
use soundeck_core::RawKeyCode;
use tracing::{debug, info, warn};

use super::{CaptureError, InputSource, RawInputEvent};

const INPUT_DIR: &str = "/dev/input";

/// evdev-backed keyboard capture.
pub struct EvdevInputSource {
    input_dir: PathBuf,
    running: Mutex<Option<Arc<AtomicBool>>>,
}

impl EvdevInputSource {
    /// Creates a source reading devices under `/dev/input`.
    pub fn new() -> Self {
        Self::with_input_dir(INPUT_DIR)
    }

    /// Creates a source reading devices under `dir`.
    pub fn with_input_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: dir.into(),
            running: Mutex::new(None),
        }
    }
}

impl Default for EvdevInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for EvdevInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        let mut running_slot = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running_slot.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let devices = find_key_devices(&self.input_dir)?;
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        spawn_readers(devices, &running, |(path, device), running| {
            let tx = tx.clone();
            let thread_name = format!(
                "soundeck-evdev-{}",
                path.file_name().and_then(|n| n.to_str()).unwrap_or("dev")
            );
            thread::Builder::new()
                .name(thread_name)
                .spawn(move || read_device_events(path, device, tx, running))
                .map(drop)
        })?;

        *running_slot = Some(running);
        Ok(rx)
    }

    fn stop(&self) {
        if let Some(running) = self.running.lock().unwrap_or_else(|e| e.into_inner()).take() {
            running.store(false, Ordering::SeqCst);
            debug!("evdev capture stopping");
        }
    }
}

/// Starts one reader per device.  On the first spawn failure `running` is
/// cleared, so readers already started exit on their next event.
fn spawn_readers<T>(
    devices: Vec<T>,
    running: &Arc<AtomicBool>,
    mut spawn: impl FnMut(T, Arc<AtomicBool>) -> std::io::Result<()>,
) -> Result<(), CaptureError> {
    for device in devices {
        if let Err(e) = spawn(device, Arc::clone(running)) {
            running.store(false, Ordering::SeqCst);
            return Err(CaptureError::HookInstallFailed(e.to_string()));
        }
    }
    Ok(())
}

/// `true` when the device can emit at least one recognised key.
fn has_recognised_key(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| INTERESTING_CODES.iter().any(|&code| keys.contains(Key::new(code))))
        .unwrap_or(false)
}

/// Opens every event node under `dir` that exposes a recognised key.
fn find_key_devices(dir: &Path) -> Result<Vec<(PathBuf, Device)>, CaptureError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => CaptureError::PermissionDenied(format!("{}: {e}", dir.display())),
        _ => CaptureError::NoDevices,
    })?;

    let mut devices = Vec::new();
    let mut denied = None;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) if has_recognised_key(&device) => {
                info!(
                    "evdev: listening on {} ({})",
                    path.display(),
                    device.name().unwrap_or("unknown")
                );
                devices.push((path, device));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!("evdev: cannot open {}: {e}", path.display());
                denied = Some(format!("{}: {e}", path.display()));
            }
            Err(e) => debug!("evdev: cannot open {}: {e}", path.display()),
        }
    }

    match (devices.is_empty(), denied) {
        (false, _) => Ok(devices),
        (true, Some(reason)) => Err(CaptureError::PermissionDenied(reason)),
        (true, None) => Err(CaptureError::NoDevices),
    }
}

fn read_device_events(
    path: PathBuf,
    mut device: Device,
    tx: Sender<RawInputEvent>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                warn!("evdev reader for {} ended: {e}", path.display());
                return;
            }
        };

        for event in events {
            let InputEventKind::Key(key) = event.kind() else {
                continue;
            };
            let code = RawKeyCode::LinuxEvdev(key.code());
            let raw = match event.value() {
                1 => RawInputEvent::KeyDown { code },
                0 => RawInputEvent::KeyUp { code },
                _ => continue,
            };
            if !running.load(Ordering::SeqCst) || tx.send(raw).is_err() {
                return;
            }
        }
    }
    debug!("evdev reader for {} stopped", path.display());
}
