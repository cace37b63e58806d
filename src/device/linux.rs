//! Evdev-based device state source
//!
//! Reads `/dev/input/event*` directly, so it works on X11, Wayland and the
//! bare console alike. The process needs read access to the event nodes,
//! which usually means membership in the `input` group.

use evdev::{Device, InputEvent, InputEventKind, Key, RelativeAxisType};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::{push_unique, DeviceQuery};
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MousePosition, MouseState};

/// Screen area the tracked pointer position is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

const BUTTONS: &[(Key, MouseButton)] = &[
    (Key::BTN_LEFT, 1),
    (Key::BTN_MIDDLE, 2),
    (Key::BTN_RIGHT, 3),
    (Key::BTN_SIDE, 4),
    (Key::BTN_EXTRA, 5),
];

const KEYS: &[(Key, Keycode)] = &[
    (Key::KEY_0, Keycode::Key0),
    (Key::KEY_1, Keycode::Key1),
    (Key::KEY_2, Keycode::Key2),
    (Key::KEY_3, Keycode::Key3),
    (Key::KEY_4, Keycode::Key4),
    (Key::KEY_5, Keycode::Key5),
    (Key::KEY_6, Keycode::Key6),
    (Key::KEY_7, Keycode::Key7),
    (Key::KEY_8, Keycode::Key8),
    (Key::KEY_9, Keycode::Key9),
    (Key::KEY_A, Keycode::A),
    (Key::KEY_B, Keycode::B),
    (Key::KEY_C, Keycode::C),
    (Key::KEY_D, Keycode::D),
    (Key::KEY_E, Keycode::E),
    (Key::KEY_F, Keycode::F),
    (Key::KEY_G, Keycode::G),
    (Key::KEY_H, Keycode::H),
    (Key::KEY_I, Keycode::I),
    (Key::KEY_J, Keycode::J),
    (Key::KEY_K, Keycode::K),
    (Key::KEY_L, Keycode::L),
    (Key::KEY_M, Keycode::M),
    (Key::KEY_N, Keycode::N),
    (Key::KEY_O, Keycode::O),
    (Key::KEY_P, Keycode::P),
    (Key::KEY_Q, Keycode::Q),
    (Key::KEY_R, Keycode::R),
    (Key::KEY_S, Keycode::S),
    (Key::KEY_T, Keycode::T),
    (Key::KEY_U, Keycode::U),
    (Key::KEY_V, Keycode::V),
    (Key::KEY_W, Keycode::W),
    (Key::KEY_X, Keycode::X),
    (Key::KEY_Y, Keycode::Y),
    (Key::KEY_Z, Keycode::Z),
    (Key::KEY_F1, Keycode::F1),
    (Key::KEY_F2, Keycode::F2),
    (Key::KEY_F3, Keycode::F3),
    (Key::KEY_F4, Keycode::F4),
    (Key::KEY_F5, Keycode::F5),
    (Key::KEY_F6, Keycode::F6),
    (Key::KEY_F7, Keycode::F7),
    (Key::KEY_F8, Keycode::F8),
    (Key::KEY_F9, Keycode::F9),
    (Key::KEY_F10, Keycode::F10),
    (Key::KEY_F11, Keycode::F11),
    (Key::KEY_F12, Keycode::F12),
    (Key::KEY_ESC, Keycode::Escape),
    (Key::KEY_SPACE, Keycode::Space),
    (Key::KEY_ENTER, Keycode::Enter),
    (Key::KEY_TAB, Keycode::Tab),
    (Key::KEY_BACKSPACE, Keycode::Backspace),
    (Key::KEY_CAPSLOCK, Keycode::CapsLock),
    (Key::KEY_LEFTCTRL, Keycode::LControl),
    (Key::KEY_RIGHTCTRL, Keycode::RControl),
    (Key::KEY_LEFTSHIFT, Keycode::LShift),
    (Key::KEY_RIGHTSHIFT, Keycode::RShift),
    (Key::KEY_LEFTALT, Keycode::LAlt),
    (Key::KEY_RIGHTALT, Keycode::RAlt),
    (Key::KEY_LEFTMETA, Keycode::LMeta),
    (Key::KEY_RIGHTMETA, Keycode::RMeta),
    (Key::KEY_UP, Keycode::Up),
    (Key::KEY_DOWN, Keycode::Down),
    (Key::KEY_LEFT, Keycode::Left),
    (Key::KEY_RIGHT, Keycode::Right),
    (Key::KEY_HOME, Keycode::Home),
    (Key::KEY_END, Keycode::End),
    (Key::KEY_PAGEUP, Keycode::PageUp),
    (Key::KEY_PAGEDOWN, Keycode::PageDown),
    (Key::KEY_INSERT, Keycode::Insert),
    (Key::KEY_DELETE, Keycode::Delete),
    (Key::KEY_KP0, Keycode::Numpad0),
    (Key::KEY_KP1, Keycode::Numpad1),
    (Key::KEY_KP2, Keycode::Numpad2),
    (Key::KEY_KP3, Keycode::Numpad3),
    (Key::KEY_KP4, Keycode::Numpad4),
    (Key::KEY_KP5, Keycode::Numpad5),
    (Key::KEY_KP6, Keycode::Numpad6),
    (Key::KEY_KP7, Keycode::Numpad7),
    (Key::KEY_KP8, Keycode::Numpad8),
    (Key::KEY_KP9, Keycode::Numpad9),
    (Key::KEY_KPMINUS, Keycode::NumpadSubtract),
    (Key::KEY_KPPLUS, Keycode::NumpadAdd),
    (Key::KEY_KPSLASH, Keycode::NumpadDivide),
    (Key::KEY_KPASTERISK, Keycode::NumpadMultiply),
    (Key::KEY_KPDOT, Keycode::NumpadDecimal),
    (Key::KEY_KPENTER, Keycode::NumpadEnter),
    (Key::KEY_GRAVE, Keycode::Grave),
    (Key::KEY_MINUS, Keycode::Minus),
    (Key::KEY_EQUAL, Keycode::Equal),
    (Key::KEY_LEFTBRACE, Keycode::LeftBracket),
    (Key::KEY_RIGHTBRACE, Keycode::RightBracket),
    (Key::KEY_BACKSLASH, Keycode::BackSlash),
    (Key::KEY_SEMICOLON, Keycode::Semicolon),
    (Key::KEY_APOSTROPHE, Keycode::Apostrophe),
    (Key::KEY_COMMA, Keycode::Comma),
    (Key::KEY_DOT, Keycode::Dot),
    (Key::KEY_SLASH, Keycode::Slash),
    (Key::KEY_NUMLOCK, Keycode::NumLock),
    (Key::KEY_SCROLLLOCK, Keycode::ScrollLock),
    (Key::KEY_SYSRQ, Keycode::PrintScreen),
    (Key::KEY_PAUSE, Keycode::Pause),
];

fn map_key(key: Key) -> Option<Keycode> {
    KEYS.iter()
        .find(|(native, _)| *native == key)
        .map(|(_, keycode)| *keycode)
}

fn map_button(key: Key) -> Option<MouseButton> {
    BUTTONS
        .iter()
        .find(|(native, _)| *native == key)
        .map(|(_, button)| *button)
}

/// What a device node can be used for. Composite nodes (receivers,
/// keyboards with a trackpoint) are both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DeviceRoles {
    keyboard: bool,
    pointer: bool,
}

impl DeviceRoles {
    fn from_capabilities(has_letter_keys: bool, has_relative_xy: bool) -> Self {
        Self {
            keyboard: has_letter_keys,
            pointer: has_relative_xy,
        }
    }

    fn is_empty(&self) -> bool {
        !self.keyboard && !self.pointer
    }
}

fn classify_device(device: &Device) -> DeviceRoles {
    let has_letter_keys = device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_S));
    let has_relative_xy = device.supported_relative_axes().map_or(false, |axes| {
        axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y)
    });
    DeviceRoles::from_capabilities(has_letter_keys, has_relative_xy)
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Move `position` by `(dx, dy)` and keep it on screen.
fn clamp_position(position: MousePosition, dx: i32, dy: i32, screen: ScreenSize) -> MousePosition {
    (
        position.0.saturating_add(dx).clamp(0, (screen.width - 1).max(0)),
        position.1.saturating_add(dy).clamp(0, (screen.height - 1).max(0)),
    )
}

/// Sum REL_X/REL_Y over every batch `fetch` returns until the device
/// reports EAGAIN. One read returns at most a few dozen events, so a
/// single fetch per tick would fall behind a fast mouse.
fn read_motion<F>(mut fetch: F) -> io::Result<(i32, i32)>
where
    F: FnMut() -> io::Result<Vec<InputEvent>>,
{
    let mut dx = 0i32;
    let mut dy = 0i32;

    loop {
        let events = match fetch() {
            Ok(events) => events,
            Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => break,
            Err(e) => return Err(e),
        };
        if events.is_empty() {
            break;
        }

        for event in events {
            if let InputEventKind::RelAxis(axis) = event.kind() {
                match axis {
                    RelativeAxisType::REL_X => dx = dx.saturating_add(event.value()),
                    RelativeAxisType::REL_Y => dy = dy.saturating_add(event.value()),
                    _ => {}
                }
            }
        }
    }

    Ok((dx, dy))
}

/// Pointer devices plus the position accumulated from their relative motion.
struct PointerTracker {
    devices: Vec<Device>,
    position: MousePosition,
    screen: ScreenSize,
}

impl PointerTracker {
    /// Drain pending motion events into `position`.
    fn drain_motion(&mut self) -> Result<(), DeviceError> {
        let mut dx = 0i32;
        let mut dy = 0i32;

        for device in &mut self.devices {
            let (x, y) = read_motion(|| device.fetch_events().map(|events| events.collect()))?;
            dx = dx.saturating_add(x);
            dy = dy.saturating_add(y);
        }

        if dx != 0 || dy != 0 {
            self.position = clamp_position(self.position, dx, dy, self.screen);
        }
        Ok(())
    }

    fn snapshot(&mut self) -> Result<MouseState, DeviceError> {
        self.drain_motion()?;

        let mut state = MouseState::new(self.position);
        for device in &self.devices {
            for key in device.get_key_state()?.iter() {
                if let Some(button) = map_button(key) {
                    state.press(button);
                }
            }
        }
        Ok(state)
    }
}

/// Evdev device state source
///
/// Keyboards and pointers sit behind separate locks so the keyboard and
/// mouse polling loops never wait on each other.
pub struct EvdevDeviceState {
    keyboards: Mutex<Vec<Device>>,
    pointer: Mutex<PointerTracker>,
}

impl EvdevDeviceState {
    /// Open every keyboard and pointer under `input_dir`.
    ///
    /// The pointer position starts at the centre of `screen`.
    pub fn open(input_dir: impl Into<PathBuf>, screen: ScreenSize) -> Result<Self, DeviceError> {
        let input_dir = input_dir.into();
        let (keyboards, pointers) = discover_devices(&input_dir)?;

        if keyboards.is_empty() && pointers.is_empty() {
            return Err(DeviceError::NoDevices(input_dir));
        }

        info!(
            "Evdev device state initialized: {} keyboard(s), {} pointer(s)",
            keyboards.len(),
            pointers.len()
        );

        Ok(Self {
            keyboards: Mutex::new(keyboards),
            pointer: Mutex::new(PointerTracker {
                devices: pointers,
                position: (screen.width / 2, screen.height / 2),
                screen,
            }),
        })
    }

    /// `/dev/input` with a 1920x1080 screen.
    pub fn new() -> Result<Self, DeviceError> {
        Self::open("/dev/input", ScreenSize::default())
    }
}

fn discover_devices(input_dir: &Path) -> Result<(Vec<Device>, Vec<Device>), DeviceError> {
    if !input_dir.exists() {
        return Err(DeviceError::NoDevices(input_dir.to_path_buf()));
    }

    let mut keyboards = Vec::new();
    let mut pointers = Vec::new();

    let mut paths: Vec<PathBuf> = fs::read_dir(input_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"))
        })
        .collect();
    paths.sort();

    for path in paths {
        let device = match Device::open(&path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        let roles = classify_device(&device);
        if roles.is_empty() {
            debug!("Ignoring {:?}: not a keyboard or pointer", path);
            continue;
        }
        let name = device.name().unwrap_or("unnamed").to_owned();

        // Each role gets its own handle so the pointer fd can be non-blocking.
        let (keyboard, pointer) = match (roles.keyboard, roles.pointer) {
            (true, true) => match Device::open(&path) {
                Ok(second) => (Some(second), Some(device)),
                Err(e) => {
                    debug!("Cannot reopen {:?} as keyboard: {}", path, e);
                    (None, Some(device))
                }
            },
            (true, false) => (Some(device), None),
            _ => (None, Some(device)),
        };

        if let Some(device) = keyboard {
            info!("Found keyboard device: {:?} ({})", path, name);
            keyboards.push(device);
        }
        if let Some(device) = pointer {
            if let Err(e) = set_nonblocking(&device) {
                debug!("Skipping {:?} as pointer: cannot set non-blocking: {}", path, e);
                continue;
            }
            info!("Found pointer device: {:?} ({})", path, name);
            pointers.push(device);
        }
    }

    Ok((keyboards, pointers))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeviceQuery for EvdevDeviceState {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        let keyboards = lock(&self.keyboards);
        let mut keys = Vec::new();
        for device in keyboards.iter() {
            for key in device.get_key_state()?.iter() {
                if let Some(keycode) = map_key(key) {
                    push_unique(&mut keys, keycode);
                }
            }
        }
        Ok(keys)
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        lock(&self.pointer).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    #[test]
    fn key_table_maps_each_keycode_once() {
        for (i, (_, a)) in KEYS.iter().enumerate() {
            for (_, b) in &KEYS[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(map_key(Key::KEY_ESC), Some(Keycode::Escape));
        assert_eq!(map_key(Key::BTN_LEFT), None);
    }

    #[test]
    fn buttons_follow_left_middle_right_order() {
        assert_eq!(map_button(Key::BTN_LEFT), Some(1));
        assert_eq!(map_button(Key::BTN_MIDDLE), Some(2));
        assert_eq!(map_button(Key::BTN_RIGHT), Some(3));
        assert_eq!(map_button(Key::KEY_A), None);
    }

    #[test]
    fn composite_device_takes_both_roles() {
        let roles = DeviceRoles::from_capabilities(true, true);
        assert!(roles.keyboard && roles.pointer);

        let mouse = DeviceRoles::from_capabilities(false, true);
        assert_eq!(mouse, DeviceRoles { keyboard: false, pointer: true });
        let keyboard = DeviceRoles::from_capabilities(true, false);
        assert_eq!(keyboard, DeviceRoles { keyboard: true, pointer: false });
        assert!(DeviceRoles::from_capabilities(false, false).is_empty());
    }

    fn rel(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
    }

    #[test]
    fn motion_is_read_until_would_block() {
        let full_batch = || -> Vec<InputEvent> {
            (0..31)
                .map(|_| rel(RelativeAxisType::REL_X, 1))
                .chain([syn()])
                .collect()
        };
        let mut batches = vec![
            Ok(full_batch()),
            Ok(full_batch()),
            Ok(vec![
                rel(RelativeAxisType::REL_Y, -4),
                rel(RelativeAxisType::REL_WHEEL, 1),
                syn(),
            ]),
            Err(io::Error::from_raw_os_error(libc::EAGAIN)),
        ]
        .into_iter();

        let mut fetches = 0;
        let motion = read_motion(|| {
            fetches += 1;
            batches.next().unwrap()
        })
        .unwrap();

        assert_eq!(motion, (62, -4));
        assert_eq!(fetches, 4);
    }

    #[test]
    fn read_errors_other_than_would_block_propagate() {
        let err = read_motion(|| Err(io::Error::from_raw_os_error(libc::ENODEV))).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENODEV));
    }

    #[test]
    fn position_is_clamped_to_screen() {
        let screen = ScreenSize {
            width: 100,
            height: 50,
        };
        assert_eq!(clamp_position((50, 25), 10, -5, screen), (60, 20));
        assert_eq!(clamp_position((50, 25), 500, 500, screen), (99, 49));
        assert_eq!(clamp_position((50, 25), -500, -500, screen), (0, 0));
    }

    #[test]
    fn missing_input_dir_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("input");
        let err = EvdevDeviceState::open(&missing, ScreenSize::default())
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::NoDevices(ref path) if *path == missing));
    }

    #[test]
    fn non_device_nodes_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("event0"), b"not a device").unwrap();
        fs::write(temp.path().join("mice"), b"").unwrap();

        let err = EvdevDeviceState::open(temp.path(), ScreenSize::default())
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::NoDevices(_)));
        assert!(err.to_string().contains("no usable keyboard or pointer"));
    }
}
