//! Polling configuration

use std::time::Duration;

/// Replaces a zero interval so that a loop never busy-spins.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Interval used when none is given.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Sleep intervals for the keyboard and mouse polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventConfig {
    keyboard_interval: Duration,
    mouse_interval: Duration,
}

impl EventConfig {
    /// Use the same interval for both loops.
    pub fn new(interval: Duration) -> Self {
        let interval = clamp(interval);
        Self {
            keyboard_interval: interval,
            mouse_interval: interval,
        }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::new(Duration::from_nanos(nanos))
    }

    pub fn with_keyboard_interval(mut self, interval: Duration) -> Self {
        self.keyboard_interval = clamp(interval);
        self
    }

    pub fn with_mouse_interval(mut self, interval: Duration) -> Self {
        self.mouse_interval = clamp(interval);
        self
    }

    pub fn keyboard_interval(&self) -> Duration {
        self.keyboard_interval
    }

    pub fn mouse_interval(&self) -> Duration {
        self.mouse_interval
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

/// Only zero is replaced. Sub-millisecond intervals are honoured.
fn clamp(interval: Duration) -> Duration {
    if interval.is_zero() {
        MIN_INTERVAL
    } else {
        interval
    }
}
