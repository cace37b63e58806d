//! Callback registry and guards
//!
//! All five partitions sit behind one mutex owned by the handler. Removal is
//! logical: deregistering flips the entry's `active` flag, and inactive
//! entries are compacted on the next insert into the same partition.

use std::collections::TryReserveError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

use super::EventKind;
use crate::keycode::Keycode;
use crate::mouse::{MouseButton, MousePosition};

pub type KeyCallback = dyn Fn(&Keycode) + Send + Sync;
pub type MoveCallback = dyn Fn(&MousePosition) + Send + Sync;
pub type ButtonCallback = dyn Fn(&MouseButton) + Send + Sync;

/// Registration id. Unique for the lifetime of one handler, starting at 1.
pub type CallbackId = u64;

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

pub(crate) fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<F: ?Sized> {
    id: CallbackId,
    active: Arc<AtomicBool>,
    callback: Arc<F>,
}

impl<F: ?Sized> Entry<F> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// A callback copied out of the registry for one dispatch.
pub(crate) struct ActiveCallback<F: ?Sized> {
    pub id: CallbackId,
    active: Arc<AtomicBool>,
    pub callback: Arc<F>,
}

impl<F: ?Sized> ActiveCallback<F> {
    /// False once the owning guard has been released.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Callbacks for one event kind, in registration order.
pub(crate) struct Partition<F: ?Sized> {
    entries: Vec<Entry<F>>,
}

impl<F: ?Sized> Partition<F> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, id: CallbackId, callback: Arc<F>) -> Result<(), TryReserveError> {
        self.entries.retain(Entry::is_active);
        self.entries.try_reserve(1)?;
        self.entries.push(Entry {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback,
        });
        Ok(())
    }

    /// Unknown or already inactive ids are ignored.
    fn deactivate(&mut self, id: CallbackId) -> bool {
        match self.entries.iter().find(|entry| entry.id == id) {
            Some(entry) => entry.active.swap(false, Ordering::AcqRel),
            None => false,
        }
    }

    /// Active callbacks in registration order.
    pub fn snapshot(&self) -> Vec<ActiveCallback<F>> {
        self.entries
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| ActiveCallback {
                id: entry.id,
                active: Arc::clone(&entry.active),
                callback: Arc::clone(&entry.callback),
            })
            .collect()
    }

    #[cfg(test)]
    fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_active()).count()
    }

    fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.active.store(false, Ordering::Release);
        }
    }
}

/// Registered callbacks, partitioned by event kind.
pub(crate) struct Registry {
    last_id: CallbackId,
    pub key_down: Partition<KeyCallback>,
    pub key_up: Partition<KeyCallback>,
    pub mouse_move: Partition<MoveCallback>,
    pub mouse_down: Partition<ButtonCallback>,
    pub mouse_up: Partition<ButtonCallback>,
}

fn insert<F: ?Sized>(
    last_id: &mut CallbackId,
    partition: &mut Partition<F>,
    callback: Arc<F>,
) -> Result<CallbackId, TryReserveError> {
    let id = *last_id + 1;
    partition.insert(id, callback)?;
    *last_id = id;
    Ok(id)
}

impl Registry {
    pub fn new() -> Self {
        Self {
            last_id: 0,
            key_down: Partition::new(),
            key_up: Partition::new(),
            mouse_move: Partition::new(),
            mouse_down: Partition::new(),
            mouse_up: Partition::new(),
        }
    }

    pub fn register_key_down(&mut self, callback: Arc<KeyCallback>) -> Result<CallbackId, TryReserveError> {
        insert(&mut self.last_id, &mut self.key_down, callback)
    }

    pub fn register_key_up(&mut self, callback: Arc<KeyCallback>) -> Result<CallbackId, TryReserveError> {
        insert(&mut self.last_id, &mut self.key_up, callback)
    }

    pub fn register_mouse_move(&mut self, callback: Arc<MoveCallback>) -> Result<CallbackId, TryReserveError> {
        insert(&mut self.last_id, &mut self.mouse_move, callback)
    }

    pub fn register_mouse_down(&mut self, callback: Arc<ButtonCallback>) -> Result<CallbackId, TryReserveError> {
        insert(&mut self.last_id, &mut self.mouse_down, callback)
    }

    pub fn register_mouse_up(&mut self, callback: Arc<ButtonCallback>) -> Result<CallbackId, TryReserveError> {
        insert(&mut self.last_id, &mut self.mouse_up, callback)
    }

    /// Mark `id` inactive. Returns whether an active entry was found.
    pub fn deregister(&mut self, kind: EventKind, id: CallbackId) -> bool {
        match kind {
            EventKind::KeyDown => self.key_down.deactivate(id),
            EventKind::KeyUp => self.key_up.deactivate(id),
            EventKind::MouseMove => self.mouse_move.deactivate(id),
            EventKind::MouseDown => self.mouse_down.deactivate(id),
            EventKind::MouseUp => self.mouse_up.deactivate(id),
        }
    }

    #[cfg(test)]
    pub fn active_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::KeyDown => self.key_down.active_count(),
            EventKind::KeyUp => self.key_up.active_count(),
            EventKind::MouseMove => self.mouse_move.active_count(),
            EventKind::MouseDown => self.mouse_down.active_count(),
            EventKind::MouseUp => self.mouse_up.active_count(),
        }
    }

    /// Deactivate and drop every entry.
    pub fn clear(&mut self) {
        self.key_down.clear();
        self.key_up.clear();
        self.mouse_move.clear();
        self.mouse_down.clear();
        self.mouse_up.clear();
    }
}

/// Keeps a callback registered until released or dropped
///
/// Releasing is idempotent. A guard may safely outlive its handler: the
/// handler clears the registry when it stops, after which release is a no-op.
#[must_use = "dropping the guard unregisters the callback"]
pub struct CallbackGuard {
    id: CallbackId,
    kind: EventKind,
    registry: Weak<Mutex<Registry>>,
    released: bool,
}

impl CallbackGuard {
    pub(crate) fn new(id: CallbackId, kind: EventKind, registry: &SharedRegistry) -> Self {
        Self {
            id,
            kind,
            registry: Arc::downgrade(registry),
            released: false,
        }
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unregister the callback. An invocation already under way may finish;
    /// later events skip it.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(registry) = self.registry.upgrade() {
            if lock(&registry).deregister(self.kind, self.id) {
                debug!("Released {} callback {}", self.kind, self.id);
            }
        }
    }
}

impl Drop for CallbackGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CallbackGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackGuard")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("released", &self.released)
            .finish()
    }
}
