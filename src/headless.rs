// MIT/Apache2 License

//! A window system with no display.
//!
//! Windows are plain records kept on the owner thread. Nothing happens to
//! them on its own; events are injected through a [`HeadlessController`],
//! which may be used from any thread.

use crate::{
    backend::Backend,
    event::{NativeEvent, NativeId, WindowEvent},
    geometry::{Point, Rect, Size},
    sync::{mtx_lock, Mutex},
    sys, Error, Result,
};
use std::{
    collections::VecDeque,
    io,
    os::unix::io::{AsRawFd, OwnedFd, RawFd},
    sync::Arc,
};

const DEFAULT_SIZE: Size = Size::new(640, 480);

/// State of one headless window.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub rect: Rect,
    pub visible: bool,
    pub title: Option<String>,
}

enum Injected {
    Event(NativeEvent),
    Failure(String),
}

struct Inbox {
    queue: Mutex<VecDeque<Injected>>,
    reader: OwnedFd,
    writer: OwnedFd,
}

/// The headless [`Backend`].
pub struct HeadlessBackend {
    inbox: Arc<Inbox>,
    windows: HashMap<NativeId, HeadlessWindow>,
    next_id: u64,
    scale: f64,
}

/// Injects native events into a [`HeadlessBackend`] from any thread.
#[derive(Clone)]
pub struct HeadlessController {
    inbox: Arc<Inbox>,
}

impl HeadlessBackend {
    pub fn new() -> Result<Self> {
        let (reader, writer) = sys::pipe()?;
        Ok(Self {
            inbox: Arc::new(Inbox {
                queue: Mutex::new(VecDeque::new()),
                reader,
                writer,
            }),
            windows: HashMap::with_hasher(Default::default()),
            // zero is left unused so a default id never names a window
            next_id: 1,
            scale: 1.0,
        })
    }

    /// Report `scale` as every window's scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn controller(&self) -> HeadlessController {
        HeadlessController {
            inbox: self.inbox.clone(),
        }
    }

    /// Look at a window's current state.
    pub fn window(&self, window: NativeId) -> Option<&HeadlessWindow> {
        self.windows.get(&window)
    }

    fn get_mut(&mut self, window: NativeId) -> Result<&mut HeadlessWindow> {
        self.windows.get_mut(&window).ok_or(Error::InvalidHandle)
    }

    fn get(&self, window: NativeId) -> Result<&HeadlessWindow> {
        self.windows.get(&window).ok_or(Error::InvalidHandle)
    }
}

impl HeadlessController {
    /// Queue a native event, as if the window system had reported it.
    pub fn inject(&self, window: NativeId, event: WindowEvent) {
        self.push(Injected::Event(NativeEvent::new(window, event)));
    }

    /// Make the next dispatch fail as if the connection had broken.
    pub fn inject_failure(&self, reason: impl Into<String>) {
        self.push(Injected::Failure(reason.into()));
    }

    fn push(&self, injected: Injected) {
        mtx_lock(&self.inbox.queue).push_back(injected);

        // a full pipe is already readable
        let _ = sys::write(self.inbox.writer.as_raw_fd(), &[1]);
    }
}

impl Backend for HeadlessBackend {
    fn event_fd(&self) -> RawFd {
        self.inbox.reader.as_raw_fd()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn dispatch(&mut self, events: &mut Vec<NativeEvent>) -> Result<()> {
        sys::drain(self.inbox.reader.as_raw_fd())?;

        let mut queue = mtx_lock(&self.inbox.queue);
        while let Some(injected) = queue.pop_front() {
            match injected {
                Injected::Event(event) => events.push(event),
                Injected::Failure(reason) => {
                    return Err(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, reason)))
                }
            }
        }

        Ok(())
    }

    fn create_window(&mut self) -> Result<NativeId> {
        let id = NativeId(self.next_id);
        self.next_id += 1;
        self.windows.insert(
            id,
            HeadlessWindow {
                rect: Rect::new(Point::default(), DEFAULT_SIZE),
                visible: false,
                title: None,
            },
        );

        Ok(id)
    }

    fn destroy_window(&mut self, window: NativeId) {
        self.windows.remove(&window);
    }

    fn show_window(&mut self, window: NativeId) -> Result<()> {
        self.get_mut(window)?.visible = true;
        Ok(())
    }

    fn hide_window(&mut self, window: NativeId) -> Result<()> {
        self.get_mut(window)?.visible = false;
        Ok(())
    }

    fn reposition_window(
        &mut self,
        window: NativeId,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<()> {
        let window = self.get_mut(window)?;
        if let Some(position) = position {
            window.rect.origin = position;
        }
        if let Some(size) = size {
            window.rect.size = size;
        }

        Ok(())
    }

    fn retitle_window(&mut self, window: NativeId, title: Option<&str>) -> Result<()> {
        self.get_mut(window)?.title = title.map(String::from);
        Ok(())
    }

    fn window_size(&mut self, window: NativeId) -> Result<Size> {
        Ok(self.get(window)?.rect.size)
    }

    fn window_position(&mut self, window: NativeId) -> Result<Rect> {
        Ok(self.get(window)?.rect)
    }

    fn window_scale(&mut self, window: NativeId) -> Result<f64> {
        self.get(window)?;
        Ok(self.scale)
    }
}

type HashMap<K, V> = hashbrown::HashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

#[cfg(test)]
mod tests {
    use super::HeadlessBackend;
    use crate::{
        backend::Backend,
        event::{NativeId, WindowEvent},
        geometry::{Point, Size},
        Error,
    };

    #[test]
    fn windows_track_their_state() {
        let mut backend = HeadlessBackend::new().unwrap().with_scale(2.0);
        let window = backend.create_window().unwrap();

        backend.show_window(window).unwrap();
        backend
            .reposition_window(window, Some(Point::new(5, 6)), None)
            .unwrap();
        backend.resize_window(window, Size::new(30, 40)).unwrap();
        backend.retitle_window(window, Some("hello")).unwrap();

        let state = backend.window(window).unwrap();
        assert!(state.visible);
        assert_eq!(state.rect.origin, Point::new(5, 6));
        assert_eq!(state.rect.size, Size::new(30, 40));
        assert_eq!(state.title.as_deref(), Some("hello"));
        assert_eq!(backend.window_scale(window).unwrap(), 2.0);

        backend.destroy_window(window);
        assert!(matches!(
            backend.window_size(window),
            Err(Error::InvalidHandle)
        ));
    }

    #[test]
    fn injected_events_dispatch_in_order() {
        let mut backend = HeadlessBackend::new().unwrap();
        let controller = backend.controller();
        controller.inject(NativeId(1), WindowEvent::Redraw);
        controller.inject(NativeId(1), WindowEvent::CloseRequested);

        let mut events = Vec::new();
        backend.dispatch(&mut events).unwrap();
        let kinds: Vec<_> = events.into_iter().map(|event| event.event).collect();
        assert_eq!(kinds, vec![WindowEvent::Redraw, WindowEvent::CloseRequested]);
    }

    #[test]
    fn injected_failure_fails_dispatch() {
        let mut backend = HeadlessBackend::new().unwrap();
        backend.controller().inject_failure("gone");

        let mut events = Vec::new();
        assert!(matches!(backend.dispatch(&mut events), Err(Error::Io(_))));
    }
}
