//! Triggers: the logical events the dispatcher resolves to a sound.
//!
//! A trigger comes from one of two producers:
//!
//! - the hardware key listener, which only ever emits one of the nineteen
//!   [`LogicalKey`] names below;
//! - a remote client, which names a button by its `id`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A physical key the listener recognises, by its configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    NumAdd,
    NumSubtract,
    NumMultiply,
    NumDivide,
    NumDecimal,
    F5,
    F6,
    F7,
    F8,
}

impl LogicalKey {
    /// Every recognised key, numeric pad first.
    pub const ALL: [LogicalKey; 19] = [
        LogicalKey::Num0,
        LogicalKey::Num1,
        LogicalKey::Num2,
        LogicalKey::Num3,
        LogicalKey::Num4,
        LogicalKey::Num5,
        LogicalKey::Num6,
        LogicalKey::Num7,
        LogicalKey::Num8,
        LogicalKey::Num9,
        LogicalKey::NumAdd,
        LogicalKey::NumSubtract,
        LogicalKey::NumMultiply,
        LogicalKey::NumDivide,
        LogicalKey::NumDecimal,
        LogicalKey::F5,
        LogicalKey::F6,
        LogicalKey::F7,
        LogicalKey::F8,
    ];

    /// The name used in a binding's `key` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            LogicalKey::Num0 => "num_0",
            LogicalKey::Num1 => "num_1",
            LogicalKey::Num2 => "num_2",
            LogicalKey::Num3 => "num_3",
            LogicalKey::Num4 => "num_4",
            LogicalKey::Num5 => "num_5",
            LogicalKey::Num6 => "num_6",
            LogicalKey::Num7 => "num_7",
            LogicalKey::Num8 => "num_8",
            LogicalKey::Num9 => "num_9",
            LogicalKey::NumAdd => "num_add",
            LogicalKey::NumSubtract => "num_subtract",
            LogicalKey::NumMultiply => "num_multiply",
            LogicalKey::NumDivide => "num_divide",
            LogicalKey::NumDecimal => "num_decimal",
            LogicalKey::F5 => "f5",
            LogicalKey::F6 => "f6",
            LogicalKey::F7 => "f7",
            LogicalKey::F8 => "f8",
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name outside the recognised key set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name {0:?}")]
pub struct UnknownKeyName(pub String);

impl FromStr for LogicalKey {
    type Err = UnknownKeyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKeyName(s.to_string()))
    }
}

/// A logical event to resolve against the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A recognised physical key was pressed.
    Key(LogicalKey),
    /// A client pressed the button with this id.
    ButtonId(i64),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Key(key) => write!(f, "key {key}"),
            Trigger::ButtonId(id) => write!(f, "button {id}"),
        }
    }
}
