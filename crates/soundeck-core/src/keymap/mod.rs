//! Key code translation tables for the hardware key listener.
//!
//! Input sources report the code their platform uses for a key; these tables
//! map the handful of codes SounDeck cares about (numeric pad and F5–F8) to a
//! [`LogicalKey`].  Everything else maps to `None` and is dropped.

pub mod linux_evdev;
pub mod windows_vk;

use crate::domain::trigger::LogicalKey;

/// A raw key code tagged with the platform table it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKeyCode {
    /// Windows Virtual Key code (`VK_*` in `winuser.h`).
    WindowsVk(u8),
    /// Linux input-event code (`KEY_*` in `linux/input-event-codes.h`).
    LinuxEvdev(u16),
}

/// Translates a raw platform key code into a recognised logical key.
pub fn translate(code: RawKeyCode) -> Option<LogicalKey> {
    match code {
        RawKeyCode::WindowsVk(vk) => windows_vk::vk_to_logical(vk),
        RawKeyCode::LinuxEvdev(key) => linux_evdev::evdev_to_logical(key),
    }
}
