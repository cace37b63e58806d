//! Win32 device state source

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

use super::{push_unique, DeviceQuery};
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MouseState};

const BUTTONS: &[(VIRTUAL_KEY, MouseButton)] = &[
    (VK_LBUTTON, 1),
    (VK_MBUTTON, 2),
    (VK_RBUTTON, 3),
    (VK_XBUTTON1, 4),
    (VK_XBUTTON2, 5),
];

const KEYS: &[(VIRTUAL_KEY, Keycode)] = &[
    (VK_0, Keycode::Key0),
    (VK_1, Keycode::Key1),
    (VK_2, Keycode::Key2),
    (VK_3, Keycode::Key3),
    (VK_4, Keycode::Key4),
    (VK_5, Keycode::Key5),
    (VK_6, Keycode::Key6),
    (VK_7, Keycode::Key7),
    (VK_8, Keycode::Key8),
    (VK_9, Keycode::Key9),
    (VK_A, Keycode::A),
    (VK_B, Keycode::B),
    (VK_C, Keycode::C),
    (VK_D, Keycode::D),
    (VK_E, Keycode::E),
    (VK_F, Keycode::F),
    (VK_G, Keycode::G),
    (VK_H, Keycode::H),
    (VK_I, Keycode::I),
    (VK_J, Keycode::J),
    (VK_K, Keycode::K),
    (VK_L, Keycode::L),
    (VK_M, Keycode::M),
    (VK_N, Keycode::N),
    (VK_O, Keycode::O),
    (VK_P, Keycode::P),
    (VK_Q, Keycode::Q),
    (VK_R, Keycode::R),
    (VK_S, Keycode::S),
    (VK_T, Keycode::T),
    (VK_U, Keycode::U),
    (VK_V, Keycode::V),
    (VK_W, Keycode::W),
    (VK_X, Keycode::X),
    (VK_Y, Keycode::Y),
    (VK_Z, Keycode::Z),
    (VK_F1, Keycode::F1),
    (VK_F2, Keycode::F2),
    (VK_F3, Keycode::F3),
    (VK_F4, Keycode::F4),
    (VK_F5, Keycode::F5),
    (VK_F6, Keycode::F6),
    (VK_F7, Keycode::F7),
    (VK_F8, Keycode::F8),
    (VK_F9, Keycode::F9),
    (VK_F10, Keycode::F10),
    (VK_F11, Keycode::F11),
    (VK_F12, Keycode::F12),
    (VK_ESCAPE, Keycode::Escape),
    (VK_SPACE, Keycode::Space),
    (VK_RETURN, Keycode::Enter),
    (VK_TAB, Keycode::Tab),
    (VK_BACK, Keycode::Backspace),
    (VK_CAPITAL, Keycode::CapsLock),
    (VK_LCONTROL, Keycode::LControl),
    (VK_RCONTROL, Keycode::RControl),
    (VK_LSHIFT, Keycode::LShift),
    (VK_RSHIFT, Keycode::RShift),
    (VK_LMENU, Keycode::LAlt),
    (VK_RMENU, Keycode::RAlt),
    (VK_LWIN, Keycode::LMeta),
    (VK_RWIN, Keycode::RMeta),
    (VK_UP, Keycode::Up),
    (VK_DOWN, Keycode::Down),
    (VK_LEFT, Keycode::Left),
    (VK_RIGHT, Keycode::Right),
    (VK_HOME, Keycode::Home),
    (VK_END, Keycode::End),
    (VK_PRIOR, Keycode::PageUp),
    (VK_NEXT, Keycode::PageDown),
    (VK_INSERT, Keycode::Insert),
    (VK_DELETE, Keycode::Delete),
    (VK_NUMPAD0, Keycode::Numpad0),
    (VK_NUMPAD1, Keycode::Numpad1),
    (VK_NUMPAD2, Keycode::Numpad2),
    (VK_NUMPAD3, Keycode::Numpad3),
    (VK_NUMPAD4, Keycode::Numpad4),
    (VK_NUMPAD5, Keycode::Numpad5),
    (VK_NUMPAD6, Keycode::Numpad6),
    (VK_NUMPAD7, Keycode::Numpad7),
    (VK_NUMPAD8, Keycode::Numpad8),
    (VK_NUMPAD9, Keycode::Numpad9),
    (VK_SUBTRACT, Keycode::NumpadSubtract),
    (VK_ADD, Keycode::NumpadAdd),
    (VK_DIVIDE, Keycode::NumpadDivide),
    (VK_MULTIPLY, Keycode::NumpadMultiply),
    (VK_DECIMAL, Keycode::NumpadDecimal),
    (VK_OEM_3, Keycode::Grave),
    (VK_OEM_MINUS, Keycode::Minus),
    (VK_OEM_PLUS, Keycode::Equal),
    (VK_OEM_4, Keycode::LeftBracket),
    (VK_OEM_6, Keycode::RightBracket),
    (VK_OEM_5, Keycode::BackSlash),
    (VK_OEM_1, Keycode::Semicolon),
    (VK_OEM_7, Keycode::Apostrophe),
    (VK_OEM_COMMA, Keycode::Comma),
    (VK_OEM_PERIOD, Keycode::Dot),
    (VK_OEM_2, Keycode::Slash),
    (VK_NUMLOCK, Keycode::NumLock),
    (VK_SCROLL, Keycode::ScrollLock),
    (VK_SNAPSHOT, Keycode::PrintScreen),
    (VK_PAUSE, Keycode::Pause),
];

fn is_down(vk: VIRTUAL_KEY) -> bool {
    // High bit set means the key is down right now.
    unsafe { GetAsyncKeyState(i32::from(vk.0)) < 0 }
}

/// Win32 device state source
///
/// Stateless: every query goes straight to `GetAsyncKeyState` and
/// `GetCursorPos`.
pub struct WindowsDeviceState {
    _private: (),
}

impl WindowsDeviceState {
    pub fn new() -> Result<Self, DeviceError> {
        Ok(Self { _private: () })
    }
}

impl DeviceQuery for WindowsDeviceState {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        let mut keys = Vec::new();
        for (vk, keycode) in KEYS {
            if is_down(*vk) {
                push_unique(&mut keys, *keycode);
            }
        }
        Ok(keys)
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| DeviceError::QueryFailed(format!("GetCursorPos: {e}")))?;

        let mut state = MouseState::new((point.x, point.y));
        for (vk, button) in BUTTONS {
            if is_down(*vk) {
                state.press(*button);
            }
        }
        Ok(state)
    }
}
