// MIT/Apache2 License

//! The callbacks an embedding application implements.

use crate::{
    event::{ButtonState, KeyCode, MouseButton},
    geometry::{Point, Rect},
    Runtime, WindowHandle,
};

/// The fixed set of callbacks the runtime invokes.
///
/// Every callback runs on the owner thread, one at a time, never
/// concurrently with another callback or with an exec job. Any runtime
/// operation may be called from inside a callback, including `quit`,
/// opening and closing windows, and `execute`/`execute_async`.
///
/// All methods default to doing nothing.
#[allow(unused_variables)]
pub trait Application {
    /// The loop is up and about to wait for events.
    fn on_start(&mut self, rt: &Runtime) {}

    /// The loop is quitting. Windows are still open and get closed right
    /// after this returns, without `on_window_close`.
    fn on_stop(&mut self, rt: &Runtime) {}

    /// Invoked once per call to `signal`.
    fn on_signal(&mut self, rt: &Runtime) {}

    /// The user asked to close `window`. The window stays open unless this
    /// callback closes it.
    fn on_window_close(&mut self, rt: &Runtime, window: WindowHandle) {}

    fn on_window_redraw(&mut self, rt: &Runtime, window: WindowHandle) {}

    fn on_window_reposition(&mut self, rt: &Runtime, window: WindowHandle, rect: Rect) {}

    fn on_cursor(&mut self, rt: &Runtime, window: WindowHandle, position: Point) {}

    fn on_cursor_exit(&mut self, rt: &Runtime, window: WindowHandle) {}

    fn on_scroll(&mut self, rt: &Runtime, window: WindowHandle, dx: i32, dy: i32) {}

    fn on_mouse(
        &mut self,
        rt: &Runtime,
        window: WindowHandle,
        button: MouseButton,
        state: ButtonState,
    ) {
    }

    fn on_keyboard(&mut self, rt: &Runtime, window: WindowHandle, key: KeyCode, state: ButtonState) {}

    fn on_text(&mut self, rt: &Runtime, window: WindowHandle, text: &str) {}
}
