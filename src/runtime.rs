// MIT/Apache2 License

//! The event loop itself, and the handles used to talk to it.

use crate::{
    app::Application,
    backend::Backend,
    event::{NativeEvent, NativeId, WindowEvent},
    geometry::{Point, Rect, Size},
    queue::{ExecQueue, Request},
    registry::{Registry, WindowHandle},
    sys, Error, ExecError, Result, RunResult,
};
use core::{
    cell::{Cell, RefCell},
    ptr,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::Arc;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    NotRunning,
    /// Native resources are being acquired. No callbacks run in this state.
    Initializing,
    Running,
    /// `on_stop` and teardown.
    Stopping,
}

/// Set while any thread is inside `run`.
static RUN_ACTIVE: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// The runtime owned by this thread, if it is running one.
    static CURRENT: Cell<*const Runtime> = Cell::new(ptr::null());
}

/// The event loop's state, as seen from the owner thread.
///
/// A `&Runtime` is handed to every callback. It cannot leave the owner
/// thread; use [`Runtime::proxy`] to get something that can.
pub struct Runtime {
    backend: RefCell<Box<dyn Backend>>,
    windows: RefCell<Registry>,
    queue: Arc<ExecQueue>,
    state: Cell<RunState>,
}

/// A cloneable, thread-safe handle to the event loop.
///
/// A proxy may outlive the run it came from; afterwards every submission
/// is canceled.
#[derive(Clone)]
pub struct Proxy {
    queue: Arc<ExecQueue>,
}

/// Run the event loop on the calling thread with a backend created by
/// `connect`, until `quit` is called or the backend fails.
///
/// The calling thread becomes the owner thread for the duration of the run.
///
/// # Panics
///
/// Panics if another event loop is already running in this process,
/// including when called from inside a callback.
pub fn run_with<A, B, F>(connect: F, mut app: A) -> RunResult
where
    A: Application,
    B: Backend + 'static,
    F: FnOnce() -> Result<B>,
{
    let _guard = RunGuard::acquire();
    let span = tracing::info_span!("run");
    let _enter = span.enter();
    tracing::debug!(state = ?RunState::Initializing, "run state");

    let queue = match ExecQueue::new() {
        Ok(queue) => Arc::new(queue),
        Err(err) => {
            tracing::error!("unable to create the exec queue: {}", err);
            return RunResult::InitFailed(err.into());
        }
    };
    let backend = match connect() {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!("unable to initialize the window system: {}", err);
            return RunResult::InitFailed(err);
        }
    };

    let rt = Runtime {
        backend: RefCell::new(Box::new(backend)),
        windows: RefCell::new(Registry::new()),
        queue,
        state: Cell::new(RunState::Initializing),
    };

    let current = CurrentGuard::set(&rt);
    let result = rt.run_loop(&mut app);
    drop(current);

    // releases the backend, after the exec queue has been shut down
    drop(rt);
    tracing::debug!(state = ?RunState::NotRunning, "run state");

    result
}

impl Runtime {
    fn run_loop<A: Application>(&self, app: &mut A) -> RunResult {
        self.transition(RunState::Running);
        app.on_start(self);

        let mut events = Vec::new();
        let mut failure = None;
        // the first pass never blocks, so anything on_start caused is seen
        let mut busy = true;

        while !self.quitting() {
            match self.pass(app, &mut events, busy) {
                Ok(serviced) => busy = serviced > 0,
                Err(err) => {
                    tracing::error!("event source failed: {}", err);
                    self.queue.request_quit(false);
                    failure = Some(err);
                }
            }
        }

        self.transition(RunState::Stopping);
        app.on_stop(self);
        self.close_all_windows();
        self.queue.shutdown();

        match failure {
            Some(err) => RunResult::IoFailed(err),
            None => RunResult::Quit,
        }
    }

    /// Wait for either source to become ready, then drain what is ready.
    /// Returns how many records and events were serviced.
    ///
    /// After a pass that did work the wait does not block, and the backend
    /// is drained regardless of its descriptor: callbacks may have made the
    /// native library buffer events internally.
    fn pass<A: Application>(
        &self,
        app: &mut A,
        events: &mut Vec<NativeEvent>,
        busy: bool,
    ) -> Result<usize> {
        let native_fd = {
            let mut backend = self.backend.borrow_mut();
            backend.flush()?;
            backend.event_fd()
        };

        let mut fds = [sys::pollfd(self.queue.reader_fd()), sys::pollfd(native_fd)];
        sys::poll(&mut fds, if busy { 0 } else { -1 })?;

        let mut serviced = 0;
        if sys::is_ready(&fds[0]) {
            serviced += self.service_queue(app)?;
        }
        if self.quitting() {
            return Ok(serviced);
        }
        if busy || sys::is_ready(&fds[1]) {
            serviced += self.service_native(app, events)?;
        }

        Ok(serviced)
    }

    fn service_queue<A: Application>(&self, app: &mut A) -> Result<usize> {
        let mut serviced = self.queue.drain(|request| match request {
            Request::Wake => {}
            Request::Signal => {
                self.deliver_signals(app);
            }
            Request::Call(call) => {
                if self.quitting() {
                    call.cancel();
                } else {
                    call.run(self);
                }
            }
        })?;

        // signals whose wake-up record did not fit in the pipe
        serviced += self.deliver_signals(app);
        Ok(serviced)
    }

    /// Invoke `on_signal` once for every signal counted so far.
    fn deliver_signals<A: Application>(&self, app: &mut A) -> usize {
        let count = self.queue.take_signals();
        for _ in 0..count {
            if self.quitting() {
                break;
            }
            app.on_signal(self);
        }
        count
    }

    fn service_native<A: Application>(
        &self,
        app: &mut A,
        events: &mut Vec<NativeEvent>,
    ) -> Result<usize> {
        self.backend.borrow_mut().dispatch(events)?;
        let serviced = events.len();

        for NativeEvent { window, event } in events.drain(..) {
            if self.quitting() {
                continue;
            }

            // the window may have been closed earlier in this pass
            let handle = match self.windows.borrow().lookup(window) {
                Some(handle) => handle,
                None => {
                    tracing::trace!(native = window.0, ?event, "dropping event for closed window");
                    continue;
                }
            };

            self.deliver(app, handle, event);
        }

        Ok(serviced)
    }

    fn deliver<A: Application>(&self, app: &mut A, window: WindowHandle, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => app.on_window_close(self, window),
            WindowEvent::Redraw => app.on_window_redraw(self, window),
            WindowEvent::Reposition(rect) => app.on_window_reposition(self, window, rect),
            WindowEvent::Cursor(position) => app.on_cursor(self, window, position),
            WindowEvent::CursorExit => app.on_cursor_exit(self, window),
            WindowEvent::Scroll { dx, dy } => app.on_scroll(self, window, dx, dy),
            WindowEvent::Mouse { button, state } => app.on_mouse(self, window, button, state),
            WindowEvent::Keyboard { key, state } => app.on_keyboard(self, window, key, state),
            WindowEvent::Text(text) => app.on_text(self, window, &text),
        }
    }

    /// Close whatever the application left open, without telling it.
    fn close_all_windows(&self) {
        let handles = self.windows.borrow().handles();
        if !handles.is_empty() {
            tracing::debug!(count = handles.len(), "closing remaining windows");
        }

        for handle in handles {
            let native = self.windows.borrow_mut().remove(handle);
            if let Some(native) = native {
                self.backend.borrow_mut().destroy_window(native);
            }
        }
    }

    fn transition(&self, next: RunState) {
        tracing::debug!(from = ?self.state.get(), state = ?next, "run state");
        self.state.set(next);
    }

    /// Get a handle other threads can use to reach this loop.
    pub fn proxy(&self) -> Proxy {
        Proxy {
            queue: self.queue.clone(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Ask the loop to stop. Only the first call has an effect.
    pub fn quit(&self) {
        // the loop checks the flag after every pass, no wake-up needed
        self.queue.request_quit(false);
    }

    pub fn quitting(&self) -> bool {
        self.queue.quitting()
    }

    /// Whether the calling thread is the one running this loop.
    pub fn is_owner_thread(&self) -> bool {
        CURRENT.with(|current| ptr::eq(current.get(), self))
    }

    /// Have `on_signal` invoked once more, on a later pass.
    pub fn signal(&self) {
        if let Err(err) = self.queue.signal() {
            tracing::debug!("signal dropped: {}", err);
        }
    }

    /// Run `f` right now. On the owner thread `execute` never queues.
    pub fn execute<F>(&self, f: F) -> core::result::Result<(), ExecError>
    where
        F: FnOnce(&Runtime),
    {
        f(self);
        Ok(())
    }

    /// Run `f` on a later pass, after everything already queued.
    pub fn execute_async<F>(&self, f: F) -> core::result::Result<(), ExecError>
    where
        F: FnOnce(&Runtime) + Send + 'static,
    {
        self.queue.submit_async(Box::new(f), true)
    }

    /// Open a new, hidden window.
    pub fn open_window(&self) -> Result<WindowHandle> {
        let native = self.backend.borrow_mut().create_window()?;
        let handle = self.windows.borrow_mut().insert(native);
        tracing::debug!(?handle, native = native.0, "opened window");
        Ok(handle)
    }

    /// Close a window. No event is delivered for it after this returns.
    pub fn close_window(&self, window: WindowHandle) -> Result<()> {
        let native = self
            .windows
            .borrow_mut()
            .remove(window)
            .ok_or(Error::InvalidHandle)?;
        self.backend.borrow_mut().destroy_window(native);
        tracing::debug!(handle = ?window, native = native.0, "closed window");
        Ok(())
    }

    pub fn show_window(&self, window: WindowHandle) -> Result<()> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().show_window(native)
    }

    pub fn hide_window(&self, window: WindowHandle) -> Result<()> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().hide_window(native)
    }

    pub fn resize_window(&self, window: WindowHandle, size: Size) -> Result<()> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().resize_window(native, size)
    }

    /// Move and/or resize a window. `None` leaves that part as it is.
    pub fn reposition_window(
        &self,
        window: WindowHandle,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<()> {
        let native = self.native_window(window)?;
        self.backend
            .borrow_mut()
            .reposition_window(native, position, size)
    }

    /// Set the window title, or clear it with `None`.
    pub fn retitle_window(&self, window: WindowHandle, title: Option<&str>) -> Result<()> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().retitle_window(native, title)
    }

    pub fn window_size(&self, window: WindowHandle) -> Result<Size> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().window_size(native)
    }

    pub fn window_position(&self, window: WindowHandle) -> Result<Rect> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().window_position(native)
    }

    pub fn window_scale(&self, window: WindowHandle) -> Result<f64> {
        let native = self.native_window(window)?;
        self.backend.borrow_mut().window_scale(native)
    }

    /// The backend's name for a window, for handing to graphics code.
    pub fn native_window(&self, window: WindowHandle) -> Result<NativeId> {
        self.windows
            .borrow()
            .get(window)
            .ok_or(Error::InvalidHandle)
    }

    /// How many windows are currently open.
    pub fn window_count(&self) -> usize {
        self.windows.borrow().len()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // normally a no-op by now; after a panicking callback this is what
        // releases blocked `execute` callers
        self.queue.request_quit(false);
        self.queue.shutdown();
    }
}

impl Proxy {
    /// Ask the loop to stop. Callable from any thread, any number of times;
    /// only the first call has an effect.
    pub fn quit(&self) {
        let on_owner = self.is_owner_thread();
        self.queue.request_quit(!on_owner);
    }

    pub fn quitting(&self) -> bool {
        self.queue.quitting()
    }

    pub fn is_owner_thread(&self) -> bool {
        self.owner().is_some()
    }

    /// Have `on_signal` invoked once more on the owner thread. Never
    /// blocks.
    pub fn signal(&self) {
        if let Err(err) = self.queue.signal() {
            tracing::debug!("signal dropped: {}", err);
        }
    }

    /// Run `f` on the owner thread and wait for it to finish.
    ///
    /// On the owner thread `f` runs inline. Elsewhere this blocks until `f`
    /// has run, or until the loop cancels it while shutting down. Side
    /// effects of `f` are visible to the caller once this returns `Ok`.
    pub fn execute<'a, F>(&self, f: F) -> core::result::Result<(), ExecError>
    where
        F: FnOnce(&Runtime) + Send + 'a,
    {
        match self.owner() {
            Some(rt) => {
                f(rt);
                Ok(())
            }
            None => self.queue.submit_sync(Box::new(f)),
        }
    }

    /// Queue `f` to run on the owner thread and return immediately.
    ///
    /// Never runs inline, even on the owner thread.
    pub fn execute_async<F>(&self, f: F) -> core::result::Result<(), ExecError>
    where
        F: FnOnce(&Runtime) + Send + 'static,
    {
        self.queue.submit_async(Box::new(f), self.is_owner_thread())
    }

    /// The runtime this proxy belongs to, if the calling thread owns it.
    fn owner(&self) -> Option<&Runtime> {
        let current = CURRENT.with(Cell::get);
        if current.is_null() {
            return None;
        }

        // the pointer is only set while `run_with` holds the runtime on
        // this thread's stack, and we are below it
        let rt = unsafe { &*current };
        if Arc::ptr_eq(&rt.queue, &self.queue) {
            Some(rt)
        } else {
            None
        }
    }
}

struct RunGuard;

impl RunGuard {
    fn acquire() -> Self {
        let acquired = RUN_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        assert!(
            acquired,
            "`run` called while an event loop is already running"
        );

        RunGuard
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUN_ACTIVE.store(false, Ordering::Release);
    }
}

struct CurrentGuard;

impl CurrentGuard {
    fn set(rt: &Runtime) -> Self {
        CURRENT.with(|current| current.set(rt));
        CurrentGuard
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(ptr::null()));
    }
}
