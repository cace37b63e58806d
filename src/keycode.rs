//! Platform-independent key identifiers

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! keycodes {
    ($($key:ident),+ $(,)?) => {
        /// A physical or logical keyboard key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Keycode {
            $($key,)+
        }

        impl Keycode {
            /// Every key, in declaration order.
            pub const ALL: &'static [Keycode] = &[$(Keycode::$key,)+];

            /// Canonical name, as printed by `Display` and accepted by `FromStr`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Keycode::$key => stringify!($key),)+
                }
            }
        }
    };
}

keycodes! {
    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Escape, Space, Enter, Tab, Backspace, CapsLock,
    LControl, RControl, LShift, RShift, LAlt, RAlt, LMeta, RMeta,
    Up, Down, Left, Right,
    Home, End, PageUp, PageDown, Insert, Delete,
    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4,
    Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    NumpadSubtract, NumpadAdd, NumpadDivide, NumpadMultiply, NumpadDecimal, NumpadEnter,
    Grave, Minus, Equal, LeftBracket, RightBracket, BackSlash,
    Semicolon, Apostrophe, Comma, Dot, Slash,
    NumLock, ScrollLock, PrintScreen, Pause,
}

impl Keycode {
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Keycode::LControl
                | Keycode::RControl
                | Keycode::LShift
                | Keycode::RShift
                | Keycode::LAlt
                | Keycode::RAlt
                | Keycode::LMeta
                | Keycode::RMeta
        )
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name: {0:?}")]
pub struct ParseKeycodeError(pub String);

impl FromStr for Keycode {
    type Err = ParseKeycodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Keycode::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseKeycodeError(s.to_string()))
    }
}
