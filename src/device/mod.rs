//! Device state sources
//!
//! Point-in-time keyboard and mouse queries. Exactly one platform variant is
//! compiled in and exported as [`DeviceState`].

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::EvdevDeviceState as DeviceState;

#[cfg(target_os = "windows")]
pub use windows::WindowsDeviceState as DeviceState;

#[cfg(target_os = "macos")]
pub use macos::MacDeviceState as DeviceState;

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub use unsupported::UnsupportedDeviceState as DeviceState;

use std::sync::Arc;

use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::MouseState;

/// Trait for device state sources
///
/// Both queries must be cheap, non-blocking beyond one native call, and safe
/// to call repeatedly from a dedicated thread. The keyboard loop only calls
/// [`query_keys`](DeviceQuery::query_keys) and the mouse loop only calls
/// [`query_mouse`](DeviceQuery::query_mouse), so the two may run concurrently.
pub trait DeviceQuery: Send + Sync {
    /// Keys currently held down, without duplicates, in native scan order.
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError>;

    /// Current pointer position and button flags.
    fn query_mouse(&self) -> Result<MouseState, DeviceError>;
}

impl<T: DeviceQuery + ?Sized> DeviceQuery for Arc<T> {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        (**self).query_keys()
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        (**self).query_mouse()
    }
}

impl<T: DeviceQuery + ?Sized> DeviceQuery for Box<T> {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        (**self).query_keys()
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        (**self).query_mouse()
    }
}

/// Open the device state source for this platform
pub fn create_source() -> Result<DeviceState, DeviceError> {
    DeviceState::new()
}

/// Append `key` unless already present.
#[allow(dead_code)]
pub(crate) fn push_unique(keys: &mut Vec<Keycode>, key: Keycode) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}
