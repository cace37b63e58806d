//! Event notification layer
//!
//! Two polling loops sample the device state source, diff successive
//! snapshots into discrete events and hand them to registered callbacks.

pub mod diff;
pub mod handler;
mod poll;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MousePosition};

pub use handler::DeviceEventsHandler;
pub use registry::{CallbackGuard, CallbackId};

/// A key transition between two keyboard snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    Down(Keycode),
    Up(Keycode),
}

/// A pointer transition between two mouse snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    Move(MousePosition),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
}

/// Callback partitions, one per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    MouseMove,
    MouseDown,
    MouseUp,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::KeyDown => write!(f, "key-down"),
            EventKind::KeyUp => write!(f, "key-up"),
            EventKind::MouseMove => write!(f, "mouse-move"),
            EventKind::MouseDown => write!(f, "mouse-down"),
            EventKind::MouseUp => write!(f, "mouse-up"),
        }
    }
}

impl KeyboardEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            KeyboardEvent::Down(_) => EventKind::KeyDown,
            KeyboardEvent::Up(_) => EventKind::KeyUp,
        }
    }
}

impl MouseEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MouseEvent::Move(_) => EventKind::MouseMove,
            MouseEvent::ButtonDown(_) => EventKind::MouseDown,
            MouseEvent::ButtonUp(_) => EventKind::MouseUp,
        }
    }
}
