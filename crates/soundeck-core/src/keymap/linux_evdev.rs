//! Linux evdev key code → [`LogicalKey`] table.
//!
//! Reference: `linux/input-event-codes.h`.  Unlike Windows, the kernel reports
//! the keypad's own codes regardless of Num Lock state.

use crate::domain::trigger::LogicalKey;

const KEY_KPASTERISK: u16 = 55;
const KEY_F5: u16 = 63;
const KEY_F6: u16 = 64;
const KEY_F7: u16 = 65;
const KEY_F8: u16 = 66;
const KEY_KP7: u16 = 71;
const KEY_KP8: u16 = 72;
const KEY_KP9: u16 = 73;
const KEY_KPMINUS: u16 = 74;
const KEY_KP4: u16 = 75;
const KEY_KP5: u16 = 76;
const KEY_KP6: u16 = 77;
const KEY_KPPLUS: u16 = 78;
const KEY_KP1: u16 = 79;
const KEY_KP2: u16 = 80;
const KEY_KP3: u16 = 81;
const KEY_KP0: u16 = 82;
const KEY_KPDOT: u16 = 83;
const KEY_KPSLASH: u16 = 98;

/// Translates a Linux input-event key code.  Returns `None` for unrecognised keys.
pub fn evdev_to_logical(code: u16) -> Option<LogicalKey> {
    use LogicalKey::*;
    let key = match code {
        KEY_KP0 => Num0,
        KEY_KP1 => Num1,
        KEY_KP2 => Num2,
        KEY_KP3 => Num3,
        KEY_KP4 => Num4,
        KEY_KP5 => Num5,
        KEY_KP6 => Num6,
        KEY_KP7 => Num7,
        KEY_KP8 => Num8,
        KEY_KP9 => Num9,
        KEY_KPPLUS => NumAdd,
        KEY_KPMINUS => NumSubtract,
        KEY_KPASTERISK => NumMultiply,
        KEY_KPSLASH => NumDivide,
        KEY_KPDOT => NumDecimal,
        KEY_F5 => F5,
        KEY_F6 => F6,
        KEY_F7 => F7,
        KEY_F8 => F8,
        _ => return None,
    };
    Some(key)
}

/// The codes a device must expose for the listener to consider it a keypad
/// or keyboard worth reading.
pub const INTERESTING_CODES: [u16; 19] = [
    KEY_KP0, KEY_KP1, KEY_KP2, KEY_KP3, KEY_KP4, KEY_KP5, KEY_KP6, KEY_KP7, KEY_KP8, KEY_KP9,
    KEY_KPPLUS, KEY_KPMINUS, KEY_KPASTERISK, KEY_KPSLASH, KEY_KPDOT, KEY_F5, KEY_F6, KEY_F7,
    KEY_F8,
];
