// MIT/Apache2 License

//! A windowing event loop that any thread can run code on.
//!
//! One thread calls [`run`] (or [`run_with`]) and becomes the owner thread:
//! it owns every window and runs every [`Application`] callback, one at a
//! time. Any other thread can reach it through a [`Proxy`], which can
//! `quit` the loop, `signal` it, or hand it functions to run with
//! [`Proxy::execute`] (blocking until the function has run) and
//! [`Proxy::execute_async`] (fire and forget).
//!
//! Functions handed to the loop run in the order they were submitted,
//! across all threads. Once the loop starts quitting, new submissions are
//! rejected with [`ExecError::Canceled`], and callers still blocked in
//! `execute` are released with the same error; nobody waits forever on a
//! loop that has stopped.
//!
//! ```no_run
//! use breadloop::{Application, Runtime, WindowHandle};
//!
//! struct App;
//!
//! impl Application for App {
//!     fn on_start(&mut self, rt: &Runtime) {
//!         let window = rt.open_window().unwrap();
//!         rt.retitle_window(window, Some("hello")).unwrap();
//!         rt.show_window(window).unwrap();
//!     }
//!
//!     fn on_window_close(&mut self, rt: &Runtime, window: WindowHandle) {
//!         rt.close_window(window).unwrap();
//!         rt.quit();
//!     }
//! }
//!
//! breadloop::run(App).into_result().unwrap();
//! ```
//!
//! Native windows come from a [`Backend`]. Two are provided: the X11
//! backend, over `libxcb`, and a headless backend whose events are
//! injected by hand, for tests and for programs with no display.
//!
//! ## Features
//!
//! - `x11` (enabled by default) - Enables the X11 backend and [`run`].
//!   Needs one of `dl` or `static` to reach `libxcb`.
//! - `dl` (enabled by default) - Loads `libxcb` at runtime with
//!   `libloading`, so a machine without it gets [`RunResult::InitFailed`]
//!   rather than a link error. Implies `x11`.
//! - `static` - Link to `libxcb` at build time instead. Implies `x11`, and
//!   takes precedence over `dl`.
//! - `pl` - Uses `parking_lot` mutexes instead of `std` mutexes throughout
//!   the crate.

#[cfg(not(unix))]
compile_error!("breadloop only supports Unix-like platforms");

#[cfg(feature = "x11")]
#[path = "alloc.rs"]
pub(crate) mod cbox;
pub(crate) mod sync;
#[cfg(feature = "x11")]
pub(crate) mod xcb_ffi;

mod app;
mod backend;
mod error;
pub mod event;
pub mod geometry;
mod headless;
#[cfg(feature = "x11")]
mod keysym;
mod queue;
mod registry;
mod runtime;
mod sys;
pub mod thread;
mod token;
#[cfg(feature = "x11")]
mod x11;

pub use app::Application;
pub use backend::Backend;
pub use error::{Error, ExecError, Result, RunResult};
pub use event::{ButtonState, KeyCode, MouseButton, NativeEvent, NativeId, WindowEvent};
pub use geometry::{Point, Rect, Size};
pub use headless::{HeadlessBackend, HeadlessController, HeadlessWindow};
pub use registry::WindowHandle;
pub use runtime::{run_with, Proxy, RunState, Runtime};
#[cfg(feature = "x11")]
pub use x11::X11Backend;

/// Run the event loop on the calling thread against the X server named by
/// `$DISPLAY`, until `quit` is called or the connection fails.
///
/// See [`run_with`] for the details.
///
/// # Panics
///
/// Panics if another event loop is already running in this process.
#[cfg(feature = "x11")]
pub fn run<A: Application>(app: A) -> RunResult {
    run_with(X11Backend::connect_default, app)
}
