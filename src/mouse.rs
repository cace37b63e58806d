//! Mouse state snapshot

/// Pointer position in screen coordinates.
pub type MousePosition = (i32, i32);

/// 1-based button index. 1 is the primary button.
pub type MouseButton = usize;

/// Number of buttons every snapshot reports, not counting the unused slot 0.
pub const MIN_BUTTONS: usize = 5;

/// A point-in-time reading of the pointer.
///
/// `button_pressed[0]` is unused so that indices match [`MouseButton`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseState {
    pub coords: MousePosition,
    pub button_pressed: Vec<bool>,
}

impl MouseState {
    /// Snapshot at `coords` with every button released.
    pub fn new(coords: MousePosition) -> Self {
        Self {
            coords,
            button_pressed: vec![false; MIN_BUTTONS + 1],
        }
    }

    /// Highest button index this snapshot carries.
    pub fn button_count(&self) -> usize {
        self.button_pressed.len().saturating_sub(1)
    }

    /// Missing indices read as released.
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        button != 0 && self.button_pressed.get(button).copied().unwrap_or(false)
    }

    /// Mark `button` as pressed, growing the button list if needed.
    pub fn press(&mut self, button: MouseButton) {
        if button == 0 {
            return;
        }
        if self.button_pressed.len() <= button {
            self.button_pressed.resize(button + 1, false);
        }
        self.button_pressed[button] = true;
    }
}

impl Default for MouseState {
    fn default() -> Self {
        Self::new((0, 0))
    }
}
