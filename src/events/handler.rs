//! Event handler facade
//!
//! Owns the device state source, the callback registry and both polling
//! threads.
//!
//! Callbacks run synchronously on the polling thread that produced the
//! event, with the registry lock released. A slow callback delays later
//! events from the same loop but never blocks registration. Callbacks may
//! call back into the handler, including releasing their own guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::poll::{KeyboardSampler, MouseSampler, PollLoop};
use super::registry::{lock, CallbackGuard, CallbackId, Registry, SharedRegistry};
use super::EventKind;
use crate::config::EventConfig;
use crate::device::{create_source, DeviceQuery};
use crate::error::{DeviceError, EventError};
use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MousePosition, MouseState};

/// Polls keyboard and mouse state and dispatches edge-triggered events.
pub struct DeviceEventsHandler {
    source: Arc<dyn DeviceQuery>,
    registry: SharedRegistry,
    running: Arc<AtomicBool>,
    keyboard_thread: Option<JoinHandle<()>>,
    mouse_thread: Option<JoinHandle<()>>,
    config: EventConfig,
}

impl DeviceEventsHandler {
    /// Start polling this platform's devices, both loops at `interval`.
    pub fn new(interval: Duration) -> Result<Self, EventError> {
        Self::with_config(EventConfig::new(interval))
    }

    pub fn with_config(config: EventConfig) -> Result<Self, EventError> {
        let source = create_source().map_err(EventError::Init)?;
        Self::with_source(source, config)
    }

    /// Start polling a caller-supplied source.
    ///
    /// The mouse loop's first snapshot is queried here, so a source that
    /// cannot report the pointer fails construction.
    pub fn with_source<S>(source: S, config: EventConfig) -> Result<Self, EventError>
    where
        S: DeviceQuery + 'static,
    {
        let source: Arc<dyn DeviceQuery> = Arc::new(source);
        let initial_mouse = source.query_mouse().map_err(EventError::Init)?;

        let mut handler = Self {
            source,
            registry: Arc::new(Mutex::new(Registry::new())),
            running: Arc::new(AtomicBool::new(true)),
            keyboard_thread: None,
            mouse_thread: None,
            config,
        };

        let keyboard = KeyboardSampler {
            source: Arc::clone(&handler.source),
            registry: Arc::clone(&handler.registry),
        };
        handler.keyboard_thread = Some(
            PollLoop::new(keyboard, config.keyboard_interval(), Arc::clone(&handler.running))
                .spawn(Vec::new())
                .map_err(|e| EventError::Spawn("keyboard", e))?,
        );

        // On failure, dropping `handler` stops the keyboard thread.
        let mouse = MouseSampler {
            source: Arc::clone(&handler.source),
            registry: Arc::clone(&handler.registry),
        };
        handler.mouse_thread = Some(
            PollLoop::new(mouse, config.mouse_interval(), Arc::clone(&handler.running))
                .spawn(initial_mouse)
                .map_err(|e| EventError::Spawn("mouse", e))?,
        );

        info!(
            "Device event polling started (keyboard every {:?}, mouse every {:?})",
            config.keyboard_interval(),
            config.mouse_interval()
        );
        Ok(handler)
    }

    pub fn config(&self) -> EventConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn on_key_down<F>(&self, callback: F) -> Result<CallbackGuard, EventError>
    where
        F: Fn(&Keycode) + Send + Sync + 'static,
    {
        let id = lock(&self.registry).register_key_down(Arc::new(callback))?;
        Ok(self.guard(EventKind::KeyDown, id))
    }

    pub fn on_key_up<F>(&self, callback: F) -> Result<CallbackGuard, EventError>
    where
        F: Fn(&Keycode) + Send + Sync + 'static,
    {
        let id = lock(&self.registry).register_key_up(Arc::new(callback))?;
        Ok(self.guard(EventKind::KeyUp, id))
    }

    pub fn on_mouse_move<F>(&self, callback: F) -> Result<CallbackGuard, EventError>
    where
        F: Fn(&MousePosition) + Send + Sync + 'static,
    {
        let id = lock(&self.registry).register_mouse_move(Arc::new(callback))?;
        Ok(self.guard(EventKind::MouseMove, id))
    }

    pub fn on_mouse_down<F>(&self, callback: F) -> Result<CallbackGuard, EventError>
    where
        F: Fn(&MouseButton) + Send + Sync + 'static,
    {
        let id = lock(&self.registry).register_mouse_down(Arc::new(callback))?;
        Ok(self.guard(EventKind::MouseDown, id))
    }

    pub fn on_mouse_up<F>(&self, callback: F) -> Result<CallbackGuard, EventError>
    where
        F: Fn(&MouseButton) + Send + Sync + 'static,
    {
        let id = lock(&self.registry).register_mouse_up(Arc::new(callback))?;
        Ok(self.guard(EventKind::MouseUp, id))
    }

    fn guard(&self, kind: EventKind, id: CallbackId) -> CallbackGuard {
        debug!("Registered {} callback {}", kind, id);
        CallbackGuard::new(id, kind, &self.registry)
    }

    /// Keys held right now, straight from the source.
    pub fn query_keys(&self) -> Result<Vec<Keycode>, DeviceError> {
        self.source.query_keys()
    }

    /// Pointer state right now, straight from the source.
    pub fn query_mouse(&self) -> Result<MouseState, DeviceError> {
        self.source.query_mouse()
    }

    /// Stop both loops, wait for them and drop every registered callback.
    pub fn stop(mut self) -> Result<(), EventError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), EventError> {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping device event polling");
        }

        let mut result = Ok(());
        let threads = [
            ("keyboard", self.keyboard_thread.take()),
            ("mouse", self.mouse_thread.take()),
        ];
        for (name, handle) in threads {
            let Some(handle) = handle else {
                continue;
            };
            // Dropped from inside a callback: the loop exits on its own.
            if handle.thread().id() == thread::current().id() {
                continue;
            }
            if handle.join().is_err() {
                error!("{} polling thread panicked", name);
                result = Err(EventError::LoopPanicked(name));
            }
        }

        lock(&self.registry).clear();
        result
    }
}

impl Drop for DeviceEventsHandler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Device event polling shut down uncleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::ScriptedSource;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(2);

    fn fast() -> EventConfig {
        EventConfig::new(Duration::from_millis(2))
    }

    fn start() -> (Arc<ScriptedSource>, DeviceEventsHandler) {
        let source = Arc::new(ScriptedSource::default());
        let handler = DeviceEventsHandler::with_source(source.clone(), fast()).unwrap();
        (source, handler)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Keycode) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        (count, move |_: &Keycode| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn key_down_and_up_are_dispatched() {
        let (source, handler) = start();
        let (tx, rx) = mpsc::channel();
        let up_tx = tx.clone();
        let _down = handler
            .on_key_down(move |key| tx.send(format!("down {key}")).unwrap())
            .unwrap();
        let _up = handler
            .on_key_up(move |key| up_tx.send(format!("up {key}")).unwrap())
            .unwrap();

        source.set_keys(&[Keycode::A]);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "down A");
        source.set_keys(&[]);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "up A");

        handler.stop().unwrap();
    }

    #[test]
    fn held_key_is_reported_once() {
        let (source, handler) = start();
        let (tx, rx) = mpsc::channel();
        let _guard = handler.on_key_down(move |key| tx.send(*key).unwrap()).unwrap();

        source.set_keys(&[Keycode::LShift]);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Keycode::LShift);

        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mouse_events_are_dispatched() {
        let (source, handler) = start();
        let (tx, rx) = mpsc::channel();
        let (down_tx, up_tx) = (tx.clone(), tx.clone());
        let _move = handler
            .on_mouse_move(move |pos| tx.send(format!("move {},{}", pos.0, pos.1)).unwrap())
            .unwrap();
        let _down = handler
            .on_mouse_down(move |button| down_tx.send(format!("down {button}")).unwrap())
            .unwrap();
        let _up = handler
            .on_mouse_up(move |button| up_tx.send(format!("up {button}")).unwrap())
            .unwrap();

        source.set_mouse(MouseState::new((5, 6)));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "move 5,6");

        let mut pressed = MouseState::new((5, 6));
        pressed.press(3);
        source.set_mouse(pressed);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "down 3");

        source.set_mouse(MouseState::new((5, 6)));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "up 3");
    }

    #[test]
    fn initial_mouse_failure_fails_construction() {
        let source = ScriptedSource::default();
        source.fail_mouse.store(true, Ordering::SeqCst);
        let err = DeviceEventsHandler::with_source(source, fast()).err().unwrap();
        assert!(matches!(err, EventError::Init(DeviceError::QueryFailed(_))));
    }

    #[test]
    fn transient_failure_does_not_synthesize_releases() {
        let (source, handler) = start();
        let (tx, rx) = mpsc::channel();
        let up_tx = tx.clone();
        let _down = handler.on_key_down(move |key| tx.send((true, *key)).unwrap()).unwrap();
        let _up = handler.on_key_up(move |key| up_tx.send((false, *key)).unwrap()).unwrap();

        source.set_keys(&[Keycode::A]);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (true, Keycode::A));

        source.fail_keys.store(true, Ordering::SeqCst);
        source.set_keys(&[]);
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());

        source.fail_keys.store(false, Ordering::SeqCst);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (false, Keycode::A));
    }

    #[test]
    fn released_guard_is_never_invoked_again() {
        let (source, handler) = start();
        let (released, on_released) = counter();
        let (kept, on_kept) = counter();
        let mut guard = handler.on_key_down(on_released).unwrap();
        let _kept_guard = handler.on_key_down(on_kept).unwrap();

        guard.release();
        guard.release();
        assert!(guard.is_released());
        drop(guard);

        source.toggle_keys.store(true, Ordering::SeqCst);
        assert!(wait_until(|| kept.load(Ordering::SeqCst) >= 3));
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn guard_ids_increase() {
        let (_source, handler) = start();
        let guards: Vec<_> = (0..5)
            .map(|_| handler.on_mouse_move(|_| {}).unwrap())
            .collect();
        assert!(guards.windows(2).all(|pair| pair[0].id() < pair[1].id()));
        assert!(guards.iter().all(|g| g.kind() == EventKind::MouseMove));
    }

    #[test]
    fn callback_can_release_its_own_guard() {
        let (source, handler) = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<CallbackGuard>>> = Arc::new(Mutex::new(None));

        let (hits, own) = (calls.clone(), slot.clone());
        let guard = handler
            .on_key_down(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(mut guard) = own.lock().unwrap().take() {
                    guard.release();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(guard);

        source.toggle_keys.store(true, Ordering::SeqCst);
        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= 1));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_registration_keeps_registry_consistent() {
        let (source, handler) = start();
        source.toggle_keys.store(true, Ordering::SeqCst);
        let handler = Arc::new(handler);

        let worker = {
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let mut kept = Vec::new();
                let mut released = Vec::new();
                for i in 0..100 {
                    let (count, callback) = counter();
                    let mut guard = handler.on_key_down(callback).unwrap();
                    if i % 2 == 0 {
                        kept.push((count, guard));
                    } else {
                        guard.release();
                        released.push(count);
                    }
                }
                (kept, released)
            })
        };
        let (kept, released) = worker.join().unwrap();

        // Let in-flight dispatches settle, then observe from a clean slate.
        thread::sleep(Duration::from_millis(20));
        for count in kept.iter().map(|(count, _)| count).chain(released.iter()) {
            count.store(0, Ordering::SeqCst);
        }

        assert!(wait_until(|| kept
            .iter()
            .all(|(count, _)| count.load(Ordering::SeqCst) > 0)));
        assert!(released.iter().all(|count| count.load(Ordering::SeqCst) == 0));
        assert_eq!(lock(&handler.registry).active_count(EventKind::KeyDown), 50);
    }

    #[test]
    fn stop_during_inflight_query_waits_at_most_one_interval() {
        let delay = Duration::from_millis(150);
        let interval = Duration::from_millis(20);
        let source = Arc::new(ScriptedSource::default());
        *source.key_delay.lock().unwrap() = delay;
        let handler =
            DeviceEventsHandler::with_source(source.clone(), EventConfig::new(interval)).unwrap();

        // Stop once the second query has entered the source but not returned.
        assert!(wait_until(|| source.key_queries_started.load(Ordering::SeqCst) >= 2));
        let started = Instant::now();
        assert_eq!(source.key_queries.load(Ordering::SeqCst), 1);
        handler.stop().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(source.key_queries.load(Ordering::SeqCst), 2);
        assert_eq!(source.key_queries_started.load(Ordering::SeqCst), 2);
        // The rest of the query, one interval, and scheduling slack.
        assert!(elapsed < delay + interval + Duration::from_millis(200));
    }

    #[test]
    fn stop_invalidates_outstanding_guards() {
        let (_source, handler) = start();
        let mut guard = handler.on_key_up(|_| {}).unwrap();
        let registry = Arc::clone(&handler.registry);
        assert!(handler.is_running());

        handler.stop().unwrap();
        assert_eq!(lock(&registry).active_count(EventKind::KeyUp), 0);

        guard.release();
        assert!(guard.is_released());
    }

    #[test]
    fn queries_delegate_to_source() {
        let (source, handler) = start();
        source.set_keys(&[Keycode::Z, Keycode::Key1]);
        source.set_mouse(MouseState::new((40, 2)));

        assert_eq!(handler.query_keys().unwrap(), vec![Keycode::Z, Keycode::Key1]);
        assert_eq!(handler.query_mouse().unwrap().coords, (40, 2));

        source.fail_keys.store(true, Ordering::SeqCst);
        assert!(handler.query_keys().is_err());
    }
}
