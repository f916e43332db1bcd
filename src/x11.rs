// MIT/Apache2 License

//! The X11 backend, over `libxcb`.

#![cfg(feature = "x11")]

use crate::{
    backend::Backend,
    cbox::CBox,
    event::{ButtonState, KeyCode, MouseButton, NativeEvent, NativeId, WindowEvent},
    geometry::{Point, Rect, Size},
    keysym::Keymap,
    xcb_ffi::{
        connection_error, errors, xcb, xproto, ClientMessageEvent, ConfigureNotifyEvent,
        Connection, ExposeEvent, GenericError, GenericEvent, GetGeometryReply, InputEvent, Screen,
        XcbFfi,
    },
    Error, Result,
};
use core::{convert::TryFrom, ptr, ptr::NonNull, slice};
use libc::c_int;
use std::{ffi::CStr, os::unix::io::RawFd};

const DEFAULT_SIZE: Size = Size::new(640, 480);

/// The X11 [`Backend`].
///
/// Every window is a top-level child of the default screen's root.
/// Requests are sent unchecked; errors the server reports for them show up
/// in the event stream and are logged.
pub struct X11Backend {
    conn: Conn,
    screen: Screen,
    atoms: Atoms,
    keymap: Keymap,
}

/// An owned `xcb_connection_t`.
struct Conn {
    ffi: &'static dyn XcbFfi,
    ptr: NonNull<Connection>,
}

struct Atoms {
    wm_protocols: u32,
    wm_delete_window: u32,
    net_wm_name: u32,
    utf8_string: u32,
}

impl X11Backend {
    /// Connect to the X server named by `display`, or by `$DISPLAY` if
    /// `None`.
    pub fn connect(display: Option<&CStr>) -> Result<Self> {
        let ffi = xcb()?;
        let mut screen_index: c_int = 0;
        let display = display.map_or(ptr::null(), CStr::as_ptr);

        let ptr = unsafe { ffi.xcb_connect(display, &mut screen_index) };
        let ptr = NonNull::new(ptr).ok_or(Error::Connection("libxcb returned no connection"))?;

        // an error connection still has to be disconnected, so wrap it first
        let conn = Conn { ffi, ptr };
        conn.check()?;

        let screen = conn.screen(screen_index)?;
        let atoms = conn.atoms()?;
        let keymap = conn.keymap()?;

        tracing::info!(
            screen = screen_index,
            root = screen.root,
            "connected to the X server"
        );

        Ok(Self {
            conn,
            screen,
            atoms,
            keymap,
        })
    }

    /// Connect to the X server named by `$DISPLAY`.
    pub fn connect_default() -> Result<Self> {
        Self::connect(None)
    }

    fn translate(&self, event: &CBox<GenericEvent>, events: &mut Vec<NativeEvent>) {
        let mut push = |window: u32, event: WindowEvent| {
            events.push(NativeEvent::new(xid_to_native(window), event))
        };

        match event.response_type & 0x7f {
            0 => {
                let error: &GenericError = unsafe { event.view() };
                let error = Error::Request {
                    code: error.error_code,
                    major_opcode: error.major_code,
                };
                tracing::warn!("{}", error);
            }
            xproto::EXPOSE => {
                let expose: &ExposeEvent = unsafe { event.view() };
                // only the last of a series
                if expose.count == 0 {
                    push(expose.window, WindowEvent::Redraw);
                }
            }
            xproto::CONFIGURE_NOTIFY => {
                let configure: &ConfigureNotifyEvent = unsafe { event.view() };
                let rect = Rect::new(
                    Point::new(configure.x.into(), configure.y.into()),
                    Size::new(configure.width.into(), configure.height.into()),
                );
                push(configure.window, WindowEvent::Reposition(rect));
            }
            xproto::CLIENT_MESSAGE => {
                let message: &ClientMessageEvent = unsafe { event.view() };
                if message.format == 32
                    && message.ty == self.atoms.wm_protocols
                    && message.data[0] == self.atoms.wm_delete_window
                {
                    push(message.window, WindowEvent::CloseRequested);
                }
            }
            xproto::MOTION_NOTIFY => {
                let motion: &InputEvent = unsafe { event.view() };
                let position = Point::new(motion.event_x.into(), motion.event_y.into());
                push(motion.event, WindowEvent::Cursor(position));
            }
            xproto::LEAVE_NOTIFY => {
                let leave: &InputEvent = unsafe { event.view() };
                push(leave.event, WindowEvent::CursorExit);
            }
            ty @ xproto::BUTTON_PRESS | ty @ xproto::BUTTON_RELEASE => {
                let button: &InputEvent = unsafe { event.view() };
                let pressed = ty == xproto::BUTTON_PRESS;

                match button.detail {
                    // wheel buttons press and release at once; count presses
                    4..=7 => {
                        if pressed {
                            let (dx, dy) = match button.detail {
                                4 => (0, 1),
                                5 => (0, -1),
                                6 => (-1, 0),
                                _ => (1, 0),
                            };
                            push(button.event, WindowEvent::Scroll { dx, dy });
                        }
                    }
                    detail => push(
                        button.event,
                        WindowEvent::Mouse {
                            button: MouseButton(detail.into()),
                            state: button_state(pressed),
                        },
                    ),
                }
            }
            ty @ xproto::KEY_PRESS | ty @ xproto::KEY_RELEASE => {
                let key: &InputEvent = unsafe { event.view() };
                let pressed = ty == xproto::KEY_PRESS;

                push(
                    key.event,
                    WindowEvent::Keyboard {
                        key: KeyCode(key.detail.into()),
                        state: button_state(pressed),
                    },
                );
                if pressed {
                    if let Some(c) = self.keymap.text(key.detail, key.state) {
                        push(key.event, WindowEvent::Text(c.to_string()));
                    }
                }
            }
            other => tracing::trace!(response_type = other, "ignoring event"),
        }
    }

    fn geometry(&self, window: u32) -> Result<CBox<GetGeometryReply>> {
        let ffi = self.conn.ffi;
        let c = self.conn.as_ptr();
        let cookie = unsafe { ffi.xcb_get_geometry(c, window) };
        self.conn
            .reply(|error| unsafe { ffi.xcb_get_geometry_reply(c, cookie, error) })
    }
}

impl Backend for X11Backend {
    fn event_fd(&self) -> RawFd {
        unsafe { self.conn.ffi.xcb_get_file_descriptor(self.conn.as_ptr()) }
    }

    fn flush(&mut self) -> Result<()> {
        if unsafe { self.conn.ffi.xcb_flush(self.conn.as_ptr()) } <= 0 {
            return Err(self.conn.error());
        }

        Ok(())
    }

    fn dispatch(&mut self, events: &mut Vec<NativeEvent>) -> Result<()> {
        loop {
            let event = unsafe { self.conn.ffi.xcb_poll_for_event(self.conn.as_ptr()) };
            match unsafe { CBox::from_raw(event) } {
                Some(event) => self.translate(&event, events),
                // no more events, or the connection broke
                None => return self.conn.check(),
            }
        }
    }

    fn create_window(&mut self) -> Result<NativeId> {
        let ffi = self.conn.ffi;
        let c = self.conn.as_ptr();

        let wid = unsafe { ffi.xcb_generate_id(c) };
        if wid == u32::MAX {
            return Err(self.conn.error());
        }

        // in mask bit order
        let values: [u32; 2] = [
            self.screen.black_pixel,
            xproto::EVENT_MASK_KEY_PRESS
                | xproto::EVENT_MASK_KEY_RELEASE
                | xproto::EVENT_MASK_BUTTON_PRESS
                | xproto::EVENT_MASK_BUTTON_RELEASE
                | xproto::EVENT_MASK_LEAVE_WINDOW
                | xproto::EVENT_MASK_POINTER_MOTION
                | xproto::EVENT_MASK_EXPOSURE
                | xproto::EVENT_MASK_STRUCTURE_NOTIFY,
        ];

        unsafe {
            ffi.xcb_create_window(
                c,
                xproto::COPY_FROM_PARENT,
                wid,
                self.screen.root,
                0,
                0,
                DEFAULT_SIZE.width as u16,
                DEFAULT_SIZE.height as u16,
                0,
                xproto::WINDOW_CLASS_INPUT_OUTPUT,
                self.screen.root_visual,
                xproto::CW_BACK_PIXEL | xproto::CW_EVENT_MASK,
                values.as_ptr().cast(),
            );

            // ask for a client message instead of being killed on close
            ffi.xcb_change_property(
                c,
                xproto::PROP_MODE_REPLACE,
                wid,
                self.atoms.wm_protocols,
                xproto::ATOM_ATOM,
                32,
                1,
                (&self.atoms.wm_delete_window as *const u32).cast(),
            );
        }

        tracing::debug!(xid = wid, "created X11 window");
        Ok(xid_to_native(wid))
    }

    fn destroy_window(&mut self, window: NativeId) {
        if let Ok(xid) = native_to_xid(window) {
            unsafe { self.conn.ffi.xcb_destroy_window(self.conn.as_ptr(), xid) };
            tracing::debug!(xid, "destroyed X11 window");
        }
    }

    fn show_window(&mut self, window: NativeId) -> Result<()> {
        let xid = native_to_xid(window)?;
        unsafe { self.conn.ffi.xcb_map_window(self.conn.as_ptr(), xid) };
        Ok(())
    }

    fn hide_window(&mut self, window: NativeId) -> Result<()> {
        let xid = native_to_xid(window)?;
        unsafe { self.conn.ffi.xcb_unmap_window(self.conn.as_ptr(), xid) };
        Ok(())
    }

    fn reposition_window(
        &mut self,
        window: NativeId,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<()> {
        let xid = native_to_xid(window)?;

        let mut mask = 0;
        let mut values = Vec::with_capacity(4);
        if let Some(position) = position {
            mask |= xproto::CONFIG_WINDOW_X | xproto::CONFIG_WINDOW_Y;
            // INT16 values go over the wire sign-extended
            values.push(position.x as u32);
            values.push(position.y as u32);
        }
        if let Some(size) = size {
            mask |= xproto::CONFIG_WINDOW_WIDTH | xproto::CONFIG_WINDOW_HEIGHT;
            values.push(size.width.clamp(1, u16::MAX.into()));
            values.push(size.height.clamp(1, u16::MAX.into()));
        }
        if mask == 0 {
            return Ok(());
        }

        unsafe {
            self.conn.ffi.xcb_configure_window(
                self.conn.as_ptr(),
                xid,
                mask,
                values.as_ptr().cast(),
            )
        };
        Ok(())
    }

    fn retitle_window(&mut self, window: NativeId, title: Option<&str>) -> Result<()> {
        let xid = native_to_xid(window)?;
        let ffi = self.conn.ffi;
        let c = self.conn.as_ptr();
        let properties = [
            (xproto::ATOM_WM_NAME, xproto::ATOM_STRING),
            (self.atoms.net_wm_name, self.atoms.utf8_string),
        ];

        match title {
            Some(title) => {
                let len = u32::try_from(title.len())
                    .map_err(|_| Error::make_msg("window title is too long"))?;
                for &(property, ty) in &properties {
                    unsafe {
                        ffi.xcb_change_property(
                            c,
                            xproto::PROP_MODE_REPLACE,
                            xid,
                            property,
                            ty,
                            8,
                            len,
                            title.as_ptr().cast(),
                        )
                    };
                }
            }
            None => {
                for &(property, _) in &properties {
                    unsafe { ffi.xcb_delete_property(c, xid, property) };
                }
            }
        }

        Ok(())
    }

    fn window_size(&mut self, window: NativeId) -> Result<Size> {
        let geometry = self.geometry(native_to_xid(window)?)?;
        Ok(Size::new(geometry.width.into(), geometry.height.into()))
    }

    fn window_position(&mut self, window: NativeId) -> Result<Rect> {
        let xid = native_to_xid(window)?;
        let geometry = self.geometry(xid)?;

        let ffi = self.conn.ffi;
        let c = self.conn.as_ptr();
        let cookie = unsafe { ffi.xcb_translate_coordinates(c, xid, self.screen.root, 0, 0) };
        let origin = self
            .conn
            .reply(|error| unsafe { ffi.xcb_translate_coordinates_reply(c, cookie, error) })?;

        Ok(Rect::new(
            Point::new(origin.dst_x.into(), origin.dst_y.into()),
            Size::new(geometry.width.into(), geometry.height.into()),
        ))
    }

    fn window_scale(&mut self, window: NativeId) -> Result<f64> {
        // make sure the window exists
        self.geometry(native_to_xid(window)?)?;

        let Screen {
            width_in_pixels,
            width_in_millimeters,
            ..
        } = self.screen;
        if width_in_millimeters == 0 {
            return Ok(1.0);
        }

        let dpi = f64::from(width_in_pixels) * 25.4 / f64::from(width_in_millimeters);
        Ok(dpi / 96.0)
    }
}

impl Conn {
    fn as_ptr(&self) -> *mut Connection {
        self.ptr.as_ptr()
    }

    fn check(&self) -> Result<()> {
        match unsafe { self.ffi.xcb_connection_has_error(self.as_ptr()) } {
            0 => Ok(()),
            code => Err(connection_error(code)),
        }
    }

    /// The error to report when a call failed without saying why.
    fn error(&self) -> Error {
        match self.check() {
            Err(err) => err,
            Ok(()) => Error::make_msg("libxcb call failed on a healthy connection"),
        }
    }

    /// Collect a reply, turning an X error into ours.
    fn reply<R>(
        &self,
        collect: impl FnOnce(*mut *mut GenericError) -> *mut R,
    ) -> Result<CBox<R>> {
        let mut error = ptr::null_mut();
        let reply = collect(&mut error);

        if let Some(error) = unsafe { CBox::from_raw(error) } {
            return Err(Error::Request {
                code: error.error_code,
                major_opcode: error.major_code,
            });
        }

        unsafe { CBox::from_raw(reply) }.ok_or_else(|| self.error())
    }

    fn screen(&self, index: c_int) -> Result<Screen> {
        let setup = unsafe { self.ffi.xcb_get_setup(self.as_ptr()) };
        let mut iter = unsafe { self.ffi.xcb_setup_roots_iterator(setup) };

        for _ in 0..index {
            if iter.rem <= 0 {
                break;
            }
            unsafe { self.ffi.xcb_screen_next(&mut iter) };
        }

        if iter.rem <= 0 || iter.data.is_null() {
            return Err(connection_error(errors::XCB_CONN_CLOSED_INVALID_SCREEN));
        }

        Ok(unsafe { *iter.data })
    }

    fn atoms(&self) -> Result<Atoms> {
        let names: [&str; 4] = [
            "WM_PROTOCOLS",
            "WM_DELETE_WINDOW",
            "_NET_WM_NAME",
            "UTF8_STRING",
        ];

        // send every request before waiting on the first reply
        let cookies: Vec<_> = names
            .iter()
            .map(|name| unsafe {
                self.ffi
                    .xcb_intern_atom(self.as_ptr(), 0, name.len() as u16, name.as_ptr().cast())
            })
            .collect();

        let atoms = cookies
            .into_iter()
            .map(|cookie| {
                self.reply(|error| unsafe {
                    self.ffi
                        .xcb_intern_atom_reply(self.as_ptr(), cookie, error)
                })
                .map(|reply| reply.atom)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Atoms {
            wm_protocols: atoms[0],
            wm_delete_window: atoms[1],
            net_wm_name: atoms[2],
            utf8_string: atoms[3],
        })
    }

    fn keymap(&self) -> Result<Keymap> {
        let (min_keycode, max_keycode) = {
            let setup = unsafe { &*self.ffi.xcb_get_setup(self.as_ptr()) };
            (setup.min_keycode, setup.max_keycode)
        };
        let count = max_keycode.saturating_sub(min_keycode).saturating_add(1);

        let cookie = unsafe {
            self.ffi
                .xcb_get_keyboard_mapping(self.as_ptr(), min_keycode, count)
        };
        let reply = self.reply(|error| unsafe {
            self.ffi
                .xcb_get_keyboard_mapping_reply(self.as_ptr(), cookie, error)
        })?;

        let keysyms = unsafe {
            let len = self.ffi.xcb_get_keyboard_mapping_keysyms_length(reply.as_ptr());
            let data = self.ffi.xcb_get_keyboard_mapping_keysyms(reply.as_ptr());
            if data.is_null() || len <= 0 {
                Vec::new()
            } else {
                slice::from_raw_parts(data, len as usize).to_vec()
            }
        };

        tracing::trace!(
            min_keycode,
            per_keycode = reply.keysyms_per_keycode,
            len = keysyms.len(),
            "loaded keyboard mapping"
        );
        Ok(Keymap::new(min_keycode, reply.keysyms_per_keycode, keysyms))
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        unsafe { self.ffi.xcb_disconnect(self.as_ptr()) };
    }
}

fn button_state(pressed: bool) -> ButtonState {
    if pressed {
        ButtonState::Pressed
    } else {
        ButtonState::Released
    }
}

fn xid_to_native(xid: u32) -> NativeId {
    NativeId(xid.into())
}

fn native_to_xid(window: NativeId) -> Result<u32> {
    u32::try_from(window.0).map_err(|_| Error::InvalidHandle)
}
