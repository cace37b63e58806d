//! Fallback for platforms without a device state source

use super::DeviceQuery;
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::MouseState;

/// Never constructible; [`UnsupportedDeviceState::new`] always fails.
pub struct UnsupportedDeviceState {
    _private: (),
}

impl UnsupportedDeviceState {
    pub fn new() -> Result<Self, DeviceError> {
        Err(DeviceError::UnsupportedPlatform)
    }
}

impl DeviceQuery for UnsupportedDeviceState {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        Err(DeviceError::UnsupportedPlatform)
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        Err(DeviceError::UnsupportedPlatform)
    }
}
