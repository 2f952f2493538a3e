//! Windows Virtual Key (VK) code → [`LogicalKey`] table.
//!
//! Reference: Windows Virtual-Key Codes (`winuser.h`).
//!
//! Windows reports numeric-pad digits as `VK_NUMPAD0`..`VK_NUMPAD9` only while
//! Num Lock is on; with Num Lock off the same physical keys arrive as the
//! navigation keys (`VK_INSERT`, `VK_END`, …) and are deliberately not mapped,
//! since those codes are shared with the dedicated navigation cluster.
//!
//! `VK_TO_LOGICAL` is a compile-time array of 256 entries indexed by VK code,
//! so every lookup from the hook thread is a single index operation.

use crate::domain::trigger::LogicalKey;

/// Translates a Windows VK code.  Returns `None` for unrecognised keys.
pub fn vk_to_logical(vk: u8) -> Option<LogicalKey> {
    VK_TO_LOGICAL[vk as usize]
}

const VK_TO_LOGICAL: [Option<LogicalKey>; 256] = {
    use LogicalKey::*;
    let mut t: [Option<LogicalKey>; 256] = [None; 256];

    // ── Numeric pad digits (VK_NUMPAD0=0x60 … VK_NUMPAD9=0x69) ───────────────
    t[0x60] = Some(Num0);
    t[0x61] = Some(Num1);
    t[0x62] = Some(Num2);
    t[0x63] = Some(Num3);
    t[0x64] = Some(Num4);
    t[0x65] = Some(Num5);
    t[0x66] = Some(Num6);
    t[0x67] = Some(Num7);
    t[0x68] = Some(Num8);
    t[0x69] = Some(Num9);

    // ── Numeric pad operators ────────────────────────────────────────────────
    t[0x6A] = Some(NumMultiply); // VK_MULTIPLY
    t[0x6B] = Some(NumAdd);      // VK_ADD
    t[0x6D] = Some(NumSubtract); // VK_SUBTRACT
    t[0x6E] = Some(NumDecimal);  // VK_DECIMAL
    t[0x6F] = Some(NumDivide);   // VK_DIVIDE

    // ── Function keys (VK_F5=0x74 … VK_F8=0x77) ──────────────────────────────
    t[0x74] = Some(F5);
    t[0x75] = Some(F6);
    t[0x76] = Some(F7);
    t[0x77] = Some(F8);

    t
};
