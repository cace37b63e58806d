//! Keyboard and mouse polling loops
//!
//! Each loop queries its half of the device state source, diffs the result
//! against the last good snapshot, dispatches the events and sleeps. The
//! shared running flag is checked once per iteration, so shutdown takes at
//! most one interval after an in-flight query returns.

use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::diff::{diff_keys, diff_mouse};
use super::registry::{lock, ActiveCallback, SharedRegistry};
use super::{EventKind, KeyboardEvent, MouseEvent};
use crate::device::DeviceQuery;
use crate::error::DeviceError;
use crate::keycode::Keycode;
use crate::mouse::MouseState;

/// Polling loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    NotStarted,
    Running,
    /// Terminal.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::NotStarted => write!(f, "NotStarted"),
            LoopState::Running => write!(f, "Running"),
            LoopState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One half of the device: how to sample it and where its events go.
pub(crate) trait Sampler: Send + 'static {
    type Snapshot: Send + 'static;

    fn name(&self) -> &'static str;

    fn sample(&self) -> Result<Self::Snapshot, DeviceError>;

    /// Diff and dispatch. Returns the number of events produced.
    fn dispatch(&self, prev: &Self::Snapshot, curr: &Self::Snapshot) -> usize;
}

/// Run one callback, containing any panic to this invocation.
fn invoke<F: ?Sized>(kind: EventKind, entry: &ActiveCallback<F>, call: impl FnOnce(&F)) {
    if !entry.is_active() {
        return;
    }
    if catch_unwind(AssertUnwindSafe(|| call(&*entry.callback))).is_err() {
        error!("{} callback {} panicked", kind, entry.id);
    }
}

pub(crate) struct KeyboardSampler {
    pub source: Arc<dyn DeviceQuery>,
    pub registry: SharedRegistry,
}

impl Sampler for KeyboardSampler {
    type Snapshot = Vec<Keycode>;

    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn sample(&self) -> Result<Vec<Keycode>, DeviceError> {
        self.source.query_keys()
    }

    fn dispatch(&self, prev: &Vec<Keycode>, curr: &Vec<Keycode>) -> usize {
        let events = diff_keys(prev, curr);
        for event in &events {
            let (key, callbacks) = {
                let registry = lock(&self.registry);
                match event {
                    KeyboardEvent::Down(key) => (key, registry.key_down.snapshot()),
                    KeyboardEvent::Up(key) => (key, registry.key_up.snapshot()),
                }
            };
            for entry in &callbacks {
                invoke(event.kind(), entry, |callback| callback(key));
            }
        }
        events.len()
    }
}

pub(crate) struct MouseSampler {
    pub source: Arc<dyn DeviceQuery>,
    pub registry: SharedRegistry,
}

impl Sampler for MouseSampler {
    type Snapshot = MouseState;

    fn name(&self) -> &'static str {
        "mouse"
    }

    fn sample(&self) -> Result<MouseState, DeviceError> {
        self.source.query_mouse()
    }

    fn dispatch(&self, prev: &MouseState, curr: &MouseState) -> usize {
        let events = diff_mouse(prev, curr);
        for event in &events {
            let kind = event.kind();
            match event {
                MouseEvent::Move(position) => {
                    let callbacks = lock(&self.registry).mouse_move.snapshot();
                    for entry in &callbacks {
                        invoke(kind, entry, |callback| callback(position));
                    }
                }
                MouseEvent::ButtonDown(button) | MouseEvent::ButtonUp(button) => {
                    let callbacks = {
                        let registry = lock(&self.registry);
                        if kind == EventKind::MouseDown {
                            registry.mouse_down.snapshot()
                        } else {
                            registry.mouse_up.snapshot()
                        }
                    };
                    for entry in &callbacks {
                        invoke(kind, entry, |callback| callback(button));
                    }
                }
            }
        }
        events.len()
    }
}

/// A polling worker for one sampler
pub(crate) struct PollLoop<S: Sampler> {
    sampler: S,
    interval: Duration,
    running: Arc<AtomicBool>,
    state: LoopState,
    failed_ticks: u64,
}

impl<S: Sampler> PollLoop<S> {
    pub fn new(sampler: S, interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            sampler,
            interval,
            running,
            state: LoopState::NotStarted,
            failed_ticks: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    fn transition_to(&mut self, new_state: LoopState) {
        info!(
            "{} poll loop: state transition: {} -> {}",
            self.sampler.name(),
            self.state,
            new_state
        );
        self.state = new_state;
    }

    /// One iteration without the sleep.
    ///
    /// A failed query keeps `last_good` untouched, so a transient error never
    /// shows up as a burst of releases.
    pub fn tick(&mut self, last_good: &mut S::Snapshot) {
        match self.sampler.sample() {
            Ok(current) => {
                if self.failed_ticks > 0 {
                    info!(
                        "{} query recovered after {} failed tick(s)",
                        self.sampler.name(),
                        self.failed_ticks
                    );
                    self.failed_ticks = 0;
                }
                let count = self.sampler.dispatch(last_good, &current);
                if count > 0 {
                    debug!("{} poll dispatched {} event(s)", self.sampler.name(), count);
                }
                *last_good = current;
            }
            Err(e) => {
                self.failed_ticks += 1;
                if self.failed_ticks == 1 {
                    warn!("{} query failed: {}", self.sampler.name(), e);
                } else {
                    debug!(
                        "{} query failed ({} ticks in a row): {}",
                        self.sampler.name(),
                        self.failed_ticks,
                        e
                    );
                }
            }
        }
    }

    /// Poll until the running flag is cleared.
    pub fn run(&mut self, initial: S::Snapshot) {
        if self.state != LoopState::NotStarted {
            return;
        }
        self.transition_to(LoopState::Running);

        let mut last_good = initial;
        while self.running.load(Ordering::Acquire) {
            self.tick(&mut last_good);
            thread::sleep(self.interval);
        }

        self.transition_to(LoopState::Stopped);
    }

    pub fn spawn(mut self, initial: S::Snapshot) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("{}-poll", self.sampler.name()))
            .spawn(move || self.run(initial))
    }
}
