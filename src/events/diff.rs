//! Snapshot differencing
//!
//! Turns two level-triggered snapshots into edge-triggered events. Steady
//! state (held or released on both sides, unchanged position) yields nothing.

use super::{KeyboardEvent, MouseEvent};
use crate::keycode::Keycode;
use crate::mouse::MouseState;

/// Key-downs for `curr - prev` in `curr` order, then key-ups for
/// `prev - curr` in `prev` order.
pub fn diff_keys(prev: &[Keycode], curr: &[Keycode]) -> Vec<KeyboardEvent> {
    let pressed = curr
        .iter()
        .filter(|key| !prev.contains(key))
        .map(|key| KeyboardEvent::Down(*key));
    let released = prev
        .iter()
        .filter(|key| !curr.contains(key))
        .map(|key| KeyboardEvent::Up(*key));
    pressed.chain(released).collect()
}

/// At most one move carrying `curr.coords`, then button transitions by
/// ascending index. Indices missing from either side count as released.
pub fn diff_mouse(prev: &MouseState, curr: &MouseState) -> Vec<MouseEvent> {
    let mut events = Vec::new();

    if prev.coords != curr.coords {
        events.push(MouseEvent::Move(curr.coords));
    }

    let buttons = prev.button_count().max(curr.button_count());
    for button in 1..=buttons {
        match (prev.is_pressed(button), curr.is_pressed(button)) {
            (false, true) => events.push(MouseEvent::ButtonDown(button)),
            (true, false) => events.push(MouseEvent::ButtonUp(button)),
            _ => {}
        }
    }

    events
}
