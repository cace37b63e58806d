//! # device-events
//!
//! Keyboard and mouse state without a focused window.
//!
//! Two access modes are provided:
//!
//! - **Queries**: [`DeviceState`] (through the [`DeviceQuery`] trait) returns
//!   the keys held and the pointer state at the moment of the call.
//! - **Events**: [`DeviceEventsHandler`] polls the same queries on two
//!   background threads, diffs successive snapshots and calls registered
//!   closures on key down/up, pointer move and button down/up.
//!
//! ```no_run
//! use device_events::{DeviceEventsHandler, Keycode};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), device_events::EventError> {
//!     let handler = DeviceEventsHandler::new(Duration::from_millis(10))?;
//!     let _guard = handler.on_key_down(|key: &Keycode| println!("down: {key}"))?;
//!     std::thread::sleep(Duration::from_secs(5));
//!     handler.stop()
//! }
//! ```
//!
//! Every `on_*` call returns a [`CallbackGuard`]; the callback stays
//! registered until the guard is released or dropped.
//!
//! ## Platforms
//!
//! - **Linux**: evdev (`/dev/input/event*`). Needs read access to the event
//!   nodes. The pointer position is tracked from relative motion.
//! - **Windows**: `GetAsyncKeyState` / `GetCursorPos`.
//! - **macOS**: CoreGraphics HID state. Needs the Input Monitoring permission.

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod keycode;
pub mod mouse;

pub use config::EventConfig;
pub use device::{create_source, DeviceQuery, DeviceState};
pub use error::{DeviceError, EventError};
pub use events::{
    CallbackGuard, CallbackId, DeviceEventsHandler, EventKind, KeyboardEvent, MouseEvent,
};
pub use keycode::{Keycode, ParseKeycodeError};
pub use mouse::{MouseButton, MousePosition, MouseState};
