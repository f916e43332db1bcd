// MIT/Apache2 License

//! Events reported by a backend, before they are attributed to a handle.

use crate::geometry::{Point, Rect};

/// A backend's own name for one of its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u64);

/// A platform key code. Opaque to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

/// A platform mouse button code. Opaque to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Something that happened to a native window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    /// The user asked for the window to be closed. Advisory only.
    CloseRequested,
    Redraw,
    /// The window moved or changed size.
    Reposition(Rect),
    /// The cursor moved inside the window.
    Cursor(Point),
    CursorExit,
    /// Scroll by whole steps; positive `dy` is away from the user.
    Scroll { dx: i32, dy: i32 },
    Mouse {
        button: MouseButton,
        state: ButtonState,
    },
    Keyboard { key: KeyCode, state: ButtonState },
    Text(String),
}

/// A window event tagged with the native window it happened to.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub window: NativeId,
    pub event: WindowEvent,
}

impl NativeEvent {
    pub fn new(window: NativeId, event: WindowEvent) -> Self {
        Self { window, event }
    }
}
