//! Windows low-level keyboard hook implementation.
//!
//! This module installs a `WH_KEYBOARD_LL` hook on a dedicated Win32
//! message-loop thread.  The hook only observes: every event is passed on to
//! the next hook, so keys keep working in other applications.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use soundeck_core::RawKeyCode;
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
};

use super::{CaptureError, InputSource, RawInputEvent};

/// Set while a hook is installed; only one may exist per process.
static HOOK_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Sender used by the hook callback to deliver events to the key listener.
static EVENT_SENDER: Mutex<Option<Sender<RawInputEvent>>> = Mutex::new(None);

#[allow(clippy::declare_interior_mutable_const)]
const RELEASED: AtomicBool = AtomicBool::new(false);

/// Per virtual-key "is down" flags, used to drop auto-repeat key-downs.
static HELD: [AtomicBool; 256] = [RELEASED; 256];

/// Windows keyboard capture via `WH_KEYBOARD_LL`.
pub struct WindowsKeyboardHook {
    /// Win32 thread id of the message loop; 0 when not running.
    thread_id: AtomicU32,
    /// The message loop thread, joined by `stop()`.
    loop_thread: Mutex<Option<JoinHandle<()>>>,
}

impl WindowsKeyboardHook {
    /// Creates a new (unstarted) hook instance.
    pub fn new() -> Self {
        Self {
            thread_id: AtomicU32::new(0),
            loop_thread: Mutex::new(None),
        }
    }
}

impl Default for WindowsKeyboardHook {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for WindowsKeyboardHook {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        if HOOK_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel::<RawInputEvent>();
        *EVENT_SENDER.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        // The loop thread reports its thread id once the hook is installed.
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();
        let spawned = thread::Builder::new()
            .name("soundeck-hook-loop".to_string())
            .spawn(move || run_hook_message_loop(ready_tx));

        let (handle, outcome) = match spawned {
            Ok(handle) => {
                let outcome = ready_rx
                    .recv()
                    .unwrap_or_else(|_| Err("hook thread exited during startup".to_string()));
                (Some(handle), outcome)
            }
            Err(e) => (None, Err(e.to_string())),
        };

        match outcome {
            Ok(thread_id) => {
                self.thread_id.store(thread_id, Ordering::SeqCst);
                *self.loop_thread.lock().unwrap_or_else(PoisonError::into_inner) = handle;
                Ok(rx)
            }
            Err(reason) => {
                // The loop thread has already returned without a hook.
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
                *EVENT_SENDER.lock().unwrap_or_else(|e| e.into_inner()) = None;
                HOOK_ACTIVE.store(false, Ordering::SeqCst);
                Err(CaptureError::HookInstallFailed(reason))
            }
        }
    }

    fn stop(&self) {
        let thread_id = self.thread_id.swap(0, Ordering::SeqCst);
        if thread_id == 0 {
            return;
        }
        // Dropping the sender closes the listener's channel.
        *EVENT_SENDER.lock().unwrap_or_else(|e| e.into_inner()) = None;

        // SAFETY: Posting WM_QUIT to a thread id we obtained from that thread;
        // the loop exits GetMessageW and unhooks itself.
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!("failed to stop keyboard hook thread: {e}");
            return;
        }

        // The loop thread clears HOOK_ACTIVE on exit.
        let handle = self
            .loop_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("keyboard hook thread panicked");
            }
        }
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop(ready: Sender<Result<u32, String>>) {
    let mut msg = MSG::default();

    // SAFETY: Forces creation of this thread's message queue so that
    // PostThreadMessageW from stop() cannot race the first GetMessageW.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }

    // SAFETY: SetWindowsHookExW requires the calling thread to run a message
    // loop, which follows immediately.
    let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) }
    {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    // SAFETY: GetCurrentThreadId has no preconditions.
    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));
    debug!("keyboard hook installed on thread {thread_id}");

    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern; blocks
    // until WM_QUIT is posted by stop().
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(hook).ok();
    }

    for held in &HELD {
        held.store(false, Ordering::Relaxed);
    }
    HOOK_ACTIVE.store(false, Ordering::SeqCst);
    debug!("keyboard hook removed");
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// This function is called by Windows from the hook message loop thread.
/// It must return quickly (< ~300ms) to avoid hook removal by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let vk_code = kbs.vkCode as u8;
    let code = RawKeyCode::WindowsVk(vk_code);

    let event = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => {
            if HELD[vk_code as usize].swap(true, Ordering::Relaxed) {
                None
            } else {
                Some(RawInputEvent::KeyDown { code })
            }
        }
        WM_KEYUP | WM_SYSKEYUP => {
            HELD[vk_code as usize].store(false, Ordering::Relaxed);
            Some(RawInputEvent::KeyUp { code })
        }
        _ => None,
    };

    if let Some(event) = event {
        if let Ok(guard) = EVENT_SENDER.try_lock() {
            if let Some(sender) = guard.as_ref() {
                // Ignore send errors (channel closed during shutdown).
                let _ = sender.send(event);
            }
        }
    }

    // SAFETY: Forward the event to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}
