//! Scripted device state source for loop and handler tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::device::DeviceQuery;
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::MouseState;

/// Returns whatever state the test last set.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    keys: Mutex<Vec<Keycode>>,
    mouse: Mutex<MouseState>,
    pub fail_keys: AtomicBool,
    pub fail_mouse: AtomicBool,
    /// Alternate between `[A]` and `[]` on every key query.
    pub toggle_keys: AtomicBool,
    pub key_delay: Mutex<Duration>,
    /// Key queries entered, counted before the delay.
    pub key_queries_started: AtomicUsize,
    /// Key queries returned.
    pub key_queries: AtomicUsize,
}

impl ScriptedSource {
    pub fn set_keys(&self, keys: &[Keycode]) {
        *self.keys.lock().unwrap() = keys.to_vec();
    }

    pub fn set_mouse(&self, state: MouseState) {
        *self.mouse.lock().unwrap() = state;
    }
}

impl DeviceQuery for ScriptedSource {
    fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        self.key_queries_started.fetch_add(1, Ordering::SeqCst);
        let delay = *self.key_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let n = self.key_queries.fetch_add(1, Ordering::SeqCst);

        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(DeviceError::QueryFailed("scripted key failure".into()));
        }
        if self.toggle_keys.load(Ordering::SeqCst) {
            return Ok(if n % 2 == 0 { vec![Keycode::A] } else { Vec::new() });
        }
        Ok(self.keys.lock().unwrap().clone())
    }

    fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        if self.fail_mouse.load(Ordering::SeqCst) {
            return Err(DeviceError::QueryFailed("scripted mouse failure".into()));
        }
        Ok(self.mouse.lock().unwrap().clone())
    }
}
