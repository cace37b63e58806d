//! CoreGraphics device state source
//!
//! Queries the HID system state table. Reading key state from another
//! application requires the Input Monitoring permission.

use core_graphics::event::{CGEvent, CGKeyCode};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use super::{push_unique, DeviceQuery};
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MouseState};

/// `kCGEventSourceStateHIDSystemState`
const HID_SYSTEM_STATE: i32 = 1;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventSourceKeyState(state_id: i32, key: CGKeyCode) -> bool;
    fn CGEventSourceButtonState(state_id: i32, button: u32) -> bool;
}

/// `CGMouseButton` values: left, right, center, then extra buttons.
const BUTTONS: &[(u32, MouseButton)] = &[(0, 1), (2, 2), (1, 3), (3, 4), (4, 5)];

// Carbon kVK_* virtual keycodes.
const KEYS: &[(CGKeyCode, Keycode)] = &[
    (0x1D, Keycode::Key0),
    (0x12, Keycode::Key1),
    (0x13, Keycode::Key2),
    (0x14, Keycode::Key3),
    (0x15, Keycode::Key4),
    (0x17, Keycode::Key5),
    (0x16, Keycode::Key6),
    (0x1A, Keycode::Key7),
    (0x1C, Keycode::Key8),
    (0x19, Keycode::Key9),
    (0x00, Keycode::A),
    (0x0B, Keycode::B),
    (0x08, Keycode::C),
    (0x02, Keycode::D),
    (0x0E, Keycode::E),
    (0x03, Keycode::F),
    (0x05, Keycode::G),
    (0x04, Keycode::H),
    (0x22, Keycode::I),
    (0x26, Keycode::J),
    (0x28, Keycode::K),
    (0x25, Keycode::L),
    (0x2E, Keycode::M),
    (0x2D, Keycode::N),
    (0x1F, Keycode::O),
    (0x23, Keycode::P),
    (0x0C, Keycode::Q),
    (0x0F, Keycode::R),
    (0x01, Keycode::S),
    (0x11, Keycode::T),
    (0x20, Keycode::U),
    (0x09, Keycode::V),
    (0x0D, Keycode::W),
    (0x07, Keycode::X),
    (0x10, Keycode::Y),
    (0x06, Keycode::Z),
    (0x7A, Keycode::F1),
    (0x78, Keycode::F2),
    (0x63, Keycode::F3),
    (0x76, Keycode::F4),
    (0x60, Keycode::F5),
    (0x61, Keycode::F6),
    (0x62, Keycode::F7),
    (0x64, Keycode::F8),
    (0x65, Keycode::F9),
    (0x6D, Keycode::F10),
    (0x67, Keycode::F11),
    (0x6F, Keycode::F12),
    (0x35, Keycode::Escape),
    (0x31, Keycode::Space),
    (0x24, Keycode::Enter),
    (0x30, Keycode::Tab),
    (0x33, Keycode::Backspace),
    (0x39, Keycode::CapsLock),
    (0x3B, Keycode::LControl),
    (0x3E, Keycode::RControl),
    (0x38, Keycode::LShift),
    (0x3C, Keycode::RShift),
    (0x3A, Keycode::LAlt),
    (0x3D, Keycode::RAlt),
    (0x37, Keycode::LMeta),
    (0x36, Keycode::RMeta),
    (0x7E, Keycode::Up),
    (0x7D, Keycode::Down),
    (0x7B, Keycode::Left),
    (0x7C, Keycode::Right),
    (0x73, Keycode::Home),
    (0x77, Keycode::End),
    (0x74, Keycode::PageUp),
    (0x79, Keycode::PageDown),
    (0x72, Keycode::Insert),
    (0x75, Keycode::Delete),
    (0x52, Keycode::Numpad0),
    (0x53, Keycode::Numpad1),
    (0x54, Keycode::Numpad2),
    (0x55, Keycode::Numpad3),
    (0x56, Keycode::Numpad4),
    (0x57, Keycode::Numpad5),
    (0x58, Keycode::Numpad6),
    (0x59, Keycode::Numpad7),
    (0x5B, Keycode::Numpad8),
    (0x5C, Keycode::Numpad9),
    (0x4E, Keycode::NumpadSubtract),
    (0x45, Keycode::NumpadAdd),
    (0x4B, Keycode::NumpadDivide),
    (0x43, Keycode::NumpadMultiply),
    (0x41, Keycode::NumpadDecimal),
    (0x4C, Keycode::NumpadEnter),
    (0x32, Keycode::Grave),
    (0x1B, Keycode::Minus),
    (0x18, Keycode::Equal),
    (0x21, Keycode::LeftBracket),
    (0x1E, Keycode::RightBracket),
    (0x2A, Keycode::BackSlash),
    (0x29, Keycode::Semicolon),
    (0x27, Keycode::Apostrophe),
    (0x2B, Keycode::Comma),
    (0x2F, Keycode::Dot),
    (0x2C, Keycode::Slash),
    (0x47, Keycode::NumLock),
];

/// CoreGraphics device state source
pub struct MacDeviceState {
    _private: (),
}

impl MacDeviceState {
    pub fn new() -> Result<Self, DeviceError> {
        // Fail early when the HID state table is unreachable.
        CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| {
            DeviceError::NotInitialized("CGEventSourceCreate failed for the HID system state".into())
        })?;
        Ok(Self { _private: () })
    }
}

impl DeviceQuery for MacDeviceState {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        let mut keys = Vec::new();
        for (code, keycode) in KEYS {
            if unsafe { CGEventSourceKeyState(HID_SYSTEM_STATE, *code) } {
                push_unique(&mut keys, *keycode);
            }
        }
        Ok(keys)
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        // CoreGraphics objects are not Send, so build them per query.
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| DeviceError::QueryFailed("CGEventSourceCreate failed".into()))?;
        let event = CGEvent::new(source)
            .map_err(|_| DeviceError::QueryFailed("CGEventCreate failed".into()))?;
        let location = event.location();

        let mut state = MouseState::new((location.x as i32, location.y as i32));
        for (cg_button, button) in BUTTONS {
            if unsafe { CGEventSourceButtonState(HID_SYSTEM_STATE, *cg_button) } {
                state.press(*button);
            }
        }
        Ok(state)
    }
}
