// MIT/Apache2 License

//! The interface every native window system implements.

use crate::{
    event::{NativeEvent, NativeId},
    geometry::{Point, Rect, Size},
    Result,
};
use std::os::unix::io::RawFd;

/// A native window system.
///
/// The event loop is written once against this trait. A backend is created
/// while the runtime initializes, lives on the owner thread, and is dropped
/// at the end of the run, which must release every native resource it still
/// holds.
pub trait Backend {
    /// The descriptor that becomes readable when native events are pending.
    fn event_fd(&self) -> RawFd;

    /// Push any buffered requests to the window system.
    fn flush(&mut self) -> Result<()>;

    /// Move every native event that is available right now into `events`,
    /// in the order the window system reported them. Must not block.
    ///
    /// An error here is fatal to the run.
    fn dispatch(&mut self, events: &mut Vec<NativeEvent>) -> Result<()>;

    fn create_window(&mut self) -> Result<NativeId>;

    /// Destroy a window. The runtime has already forgotten it.
    fn destroy_window(&mut self, window: NativeId);

    fn show_window(&mut self, window: NativeId) -> Result<()>;

    fn hide_window(&mut self, window: NativeId) -> Result<()>;

    fn resize_window(&mut self, window: NativeId, size: Size) -> Result<()> {
        self.reposition_window(window, None, Some(size))
    }

    /// Move and/or resize a window. `None` leaves that part alone.
    fn reposition_window(
        &mut self,
        window: NativeId,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<()>;

    /// Set the title, or remove it with `None`.
    fn retitle_window(&mut self, window: NativeId, title: Option<&str>) -> Result<()>;

    fn window_size(&mut self, window: NativeId) -> Result<Size>;

    /// The window's position on screen, together with its size.
    fn window_position(&mut self, window: NativeId) -> Result<Rect>;

    /// Ratio of physical pixels to logical pixels.
    fn window_scale(&mut self, window: NativeId) -> Result<f64>;
}
