// MIT/Apache2 License

//! The slice of `libxcb` the X11 backend uses, behind a trait so it can be
//! linked statically or loaded at runtime.

#![cfg(feature = "x11")]

use crate::{Error, Result};
use libc::{c_char, c_int, c_uint, c_void};
use once_cell::sync::OnceCell;

#[cfg(all(feature = "dl", not(feature = "static")))]
mod dynamic_link;
#[cfg(feature = "static")]
mod static_link;

/// A trait for FFI with `libxcb`, using either static or dynamic linking.
///
/// # Safety
///
/// Implementors must forward each call to the `libxcb` function of the
/// same name.
pub(crate) unsafe trait XcbFfi {
    // connecting
    unsafe fn xcb_connect(&self, display: *const c_char, screenp: *mut c_int) -> *mut Connection;
    unsafe fn xcb_connection_has_error(&self, conn: *mut Connection) -> c_int;
    unsafe fn xcb_disconnect(&self, conn: *mut Connection);

    // utilities
    unsafe fn xcb_get_file_descriptor(&self, conn: *mut Connection) -> c_int;
    unsafe fn xcb_get_setup(&self, conn: *mut Connection) -> *const Setup;
    unsafe fn xcb_setup_roots_iterator(&self, setup: *const Setup) -> ScreenIterator;
    unsafe fn xcb_screen_next(&self, iter: *mut ScreenIterator);
    unsafe fn xcb_generate_id(&self, conn: *mut Connection) -> u32;
    unsafe fn xcb_flush(&self, conn: *mut Connection) -> c_int;

    // events
    unsafe fn xcb_poll_for_event(&self, conn: *mut Connection) -> *mut GenericEvent;

    // window requests
    unsafe fn xcb_create_window(
        &self,
        conn: *mut Connection,
        depth: u8,
        wid: u32,
        parent: u32,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        border_width: u16,
        class: u16,
        visual: u32,
        value_mask: u32,
        value_list: *const c_void,
    ) -> VoidCookie;
    unsafe fn xcb_destroy_window(&self, conn: *mut Connection, window: u32) -> VoidCookie;
    unsafe fn xcb_map_window(&self, conn: *mut Connection, window: u32) -> VoidCookie;
    unsafe fn xcb_unmap_window(&self, conn: *mut Connection, window: u32) -> VoidCookie;
    unsafe fn xcb_configure_window(
        &self,
        conn: *mut Connection,
        window: u32,
        value_mask: u16,
        value_list: *const c_void,
    ) -> VoidCookie;
    unsafe fn xcb_change_property(
        &self,
        conn: *mut Connection,
        mode: u8,
        window: u32,
        property: u32,
        ty: u32,
        format: u8,
        data_len: u32,
        data: *const c_void,
    ) -> VoidCookie;
    unsafe fn xcb_delete_property(
        &self,
        conn: *mut Connection,
        window: u32,
        property: u32,
    ) -> VoidCookie;

    // requests with replies
    unsafe fn xcb_intern_atom(
        &self,
        conn: *mut Connection,
        only_if_exists: u8,
        name_len: u16,
        name: *const c_char,
    ) -> Cookie;
    unsafe fn xcb_intern_atom_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut InternAtomReply;
    unsafe fn xcb_get_geometry(&self, conn: *mut Connection, drawable: u32) -> Cookie;
    unsafe fn xcb_get_geometry_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetGeometryReply;
    unsafe fn xcb_translate_coordinates(
        &self,
        conn: *mut Connection,
        src_window: u32,
        dst_window: u32,
        src_x: i16,
        src_y: i16,
    ) -> Cookie;
    unsafe fn xcb_translate_coordinates_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut TranslateCoordinatesReply;
    unsafe fn xcb_get_keyboard_mapping(
        &self,
        conn: *mut Connection,
        first_keycode: u8,
        count: u8,
    ) -> Cookie;
    unsafe fn xcb_get_keyboard_mapping_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetKeyboardMappingReply;
    unsafe fn xcb_get_keyboard_mapping_keysyms(
        &self,
        reply: *const GetKeyboardMappingReply,
    ) -> *mut u32;
    unsafe fn xcb_get_keyboard_mapping_keysyms_length(
        &self,
        reply: *const GetKeyboardMappingReply,
    ) -> c_int;
}

/// Opaque type for the `libxcb` connection.
#[repr(C)]
pub(crate) struct Connection {
    _opaque_type: [u8; 0],
}

/// The fixed part of the connection setup block.
#[repr(C)]
pub(crate) struct Setup {
    pub(crate) status: u8,
    pub(crate) pad0: u8,
    pub(crate) protocol_major_version: u16,
    pub(crate) protocol_minor_version: u16,
    pub(crate) length: u16,
    pub(crate) release_number: u32,
    pub(crate) resource_id_base: u32,
    pub(crate) resource_id_mask: u32,
    pub(crate) motion_buffer_size: u32,
    pub(crate) vendor_len: u16,
    pub(crate) maximum_request_length: u16,
    pub(crate) roots_len: u8,
    pub(crate) pixmap_formats_len: u8,
    pub(crate) image_byte_order: u8,
    pub(crate) bitmap_format_bit_order: u8,
    pub(crate) bitmap_format_scanline_unit: u8,
    pub(crate) bitmap_format_scanline_pad: u8,
    pub(crate) min_keycode: u8,
    pub(crate) max_keycode: u8,
    pub(crate) pad1: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct Screen {
    pub(crate) root: u32,
    pub(crate) default_colormap: u32,
    pub(crate) white_pixel: u32,
    pub(crate) black_pixel: u32,
    pub(crate) current_input_masks: u32,
    pub(crate) width_in_pixels: u16,
    pub(crate) height_in_pixels: u16,
    pub(crate) width_in_millimeters: u16,
    pub(crate) height_in_millimeters: u16,
    pub(crate) min_installed_maps: u16,
    pub(crate) max_installed_maps: u16,
    pub(crate) root_visual: u32,
    pub(crate) backing_stores: u8,
    pub(crate) save_unders: u8,
    pub(crate) root_depth: u8,
    pub(crate) allowed_depths_len: u8,
}

#[repr(C)]
pub(crate) struct ScreenIterator {
    pub(crate) data: *mut Screen,
    pub(crate) rem: c_int,
    pub(crate) index: c_int,
}

/// XCB-side event repr. Every core event is 32 bytes.
#[repr(C)]
pub(crate) struct GenericEvent {
    pub(crate) response_type: u8,
    pub(crate) pad0: u8,
    pub(crate) sequence: u16,
    pub(crate) pad: [u32; 7],
    pub(crate) full_sequence: u32,
}

/// X11 error as delivered in the event stream or a reply slot.
#[repr(C)]
pub(crate) struct GenericError {
    pub(crate) response_type: u8,
    pub(crate) error_code: u8,
    pub(crate) sequence: u16,
    pub(crate) resource_id: u32,
    pub(crate) minor_code: u16,
    pub(crate) major_code: u8,
    pub(crate) pad0: u8,
    pub(crate) pad: [u32; 5],
    pub(crate) full_sequence: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct VoidCookie {
    pub(crate) sequence: c_uint,
}

/// The cookie of a request that has a reply. Every such cookie type in
/// `libxcb` has this layout.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct Cookie {
    pub(crate) sequence: c_uint,
}

#[repr(C)]
pub(crate) struct InternAtomReply {
    pub(crate) response_type: u8,
    pub(crate) pad0: u8,
    pub(crate) sequence: u16,
    pub(crate) length: u32,
    pub(crate) atom: u32,
}

#[repr(C)]
pub(crate) struct GetGeometryReply {
    pub(crate) response_type: u8,
    pub(crate) depth: u8,
    pub(crate) sequence: u16,
    pub(crate) length: u32,
    pub(crate) root: u32,
    pub(crate) x: i16,
    pub(crate) y: i16,
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) border_width: u16,
    pub(crate) pad0: [u8; 2],
}

#[repr(C)]
pub(crate) struct TranslateCoordinatesReply {
    pub(crate) response_type: u8,
    pub(crate) same_screen: u8,
    pub(crate) sequence: u16,
    pub(crate) length: u32,
    pub(crate) child: u32,
    pub(crate) dst_x: i16,
    pub(crate) dst_y: i16,
}

#[repr(C)]
pub(crate) struct GetKeyboardMappingReply {
    pub(crate) response_type: u8,
    pub(crate) keysyms_per_keycode: u8,
    pub(crate) sequence: u16,
    pub(crate) length: u32,
    pub(crate) pad0: [u8; 24],
}

/// Key, button, motion and crossing events share this layout up to `state`.
#[repr(C)]
pub(crate) struct InputEvent {
    pub(crate) response_type: u8,
    pub(crate) detail: u8,
    pub(crate) sequence: u16,
    pub(crate) time: u32,
    pub(crate) root: u32,
    pub(crate) event: u32,
    pub(crate) child: u32,
    pub(crate) root_x: i16,
    pub(crate) root_y: i16,
    pub(crate) event_x: i16,
    pub(crate) event_y: i16,
    pub(crate) state: u16,
    pub(crate) pad0: [u8; 2],
}

#[repr(C)]
pub(crate) struct ExposeEvent {
    pub(crate) response_type: u8,
    pub(crate) pad0: u8,
    pub(crate) sequence: u16,
    pub(crate) window: u32,
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) count: u16,
    pub(crate) pad1: [u8; 2],
}

#[repr(C)]
pub(crate) struct ConfigureNotifyEvent {
    pub(crate) response_type: u8,
    pub(crate) pad0: u8,
    pub(crate) sequence: u16,
    pub(crate) event: u32,
    pub(crate) window: u32,
    pub(crate) above_sibling: u32,
    pub(crate) x: i16,
    pub(crate) y: i16,
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) border_width: u16,
    pub(crate) override_redirect: u8,
    pub(crate) pad1: u8,
}

/// A client message with 32-bit data.
#[repr(C)]
pub(crate) struct ClientMessageEvent {
    pub(crate) response_type: u8,
    pub(crate) format: u8,
    pub(crate) sequence: u16,
    pub(crate) window: u32,
    pub(crate) ty: u32,
    pub(crate) data: [u32; 5],
}

cfg_if::cfg_if! {
    if #[cfg(feature = "static")] {
        type Impl = static_link::StaticFfi;
    } else if #[cfg(feature = "dl")] {
        type Impl = dynamic_link::DynamicFfi;
    } else {
        compile_error!("the `x11` feature needs either `dl` or `static`");
    }
}

/// Global object used to make `libxcb` calls.
static XCB: OnceCell<Impl> = OnceCell::new();

/// Get the `libxcb` bindings, loading the library on first use.
pub(crate) fn xcb() -> Result<&'static dyn XcbFfi> {
    let ffi = XCB.get_or_try_init(Impl::load)?;

    Ok(ffi)
}

/// `libxcb` connection error codes.
pub(crate) mod errors {
    use libc::c_int;

    pub(crate) const XCB_CONN_ERROR: c_int = 1;
    pub(crate) const XCB_CONN_CLOSED_EXT_NOTSUPPORTED: c_int = 2;
    pub(crate) const XCB_CONN_CLOSED_MEM_INSUFFICIENT: c_int = 3;
    pub(crate) const XCB_CONN_CLOSED_REQ_LEN_EXCEED: c_int = 4;
    pub(crate) const XCB_CONN_CLOSED_PARSE_ERR: c_int = 5;
    pub(crate) const XCB_CONN_CLOSED_INVALID_SCREEN: c_int = 6;
    pub(crate) const XCB_CONN_CLOSED_FDPASSING_FAILED: c_int = 7;
}

/// Map a connection error code to our error type.
pub(crate) fn connection_error(code: c_int) -> Error {
    match code {
        errors::XCB_CONN_ERROR => Error::Connection("the connection was shut down by an I/O error"),
        errors::XCB_CONN_CLOSED_EXT_NOTSUPPORTED => {
            Error::Connection("a required extension is not supported")
        }
        errors::XCB_CONN_CLOSED_MEM_INSUFFICIENT => Error::Connection("out of memory"),
        errors::XCB_CONN_CLOSED_REQ_LEN_EXCEED => {
            Error::Connection("a request exceeded the server's maximum length")
        }
        errors::XCB_CONN_CLOSED_PARSE_ERR => Error::Connection("unable to parse the display string"),
        errors::XCB_CONN_CLOSED_INVALID_SCREEN => {
            Error::Connection("the display has no screen matching the display string")
        }
        errors::XCB_CONN_CLOSED_FDPASSING_FAILED => Error::Connection("failed to pass an FD"),
        _ => Error::Connection("unknown error"),
    }
}

/// Protocol constants from `xproto.h`.
pub(crate) mod xproto {
    pub(crate) const COPY_FROM_PARENT: u8 = 0;
    pub(crate) const WINDOW_CLASS_INPUT_OUTPUT: u16 = 1;

    pub(crate) const CW_BACK_PIXEL: u32 = 1 << 1;
    pub(crate) const CW_EVENT_MASK: u32 = 1 << 11;

    pub(crate) const EVENT_MASK_KEY_PRESS: u32 = 1 << 0;
    pub(crate) const EVENT_MASK_KEY_RELEASE: u32 = 1 << 1;
    pub(crate) const EVENT_MASK_BUTTON_PRESS: u32 = 1 << 2;
    pub(crate) const EVENT_MASK_BUTTON_RELEASE: u32 = 1 << 3;
    pub(crate) const EVENT_MASK_LEAVE_WINDOW: u32 = 1 << 5;
    pub(crate) const EVENT_MASK_POINTER_MOTION: u32 = 1 << 6;
    pub(crate) const EVENT_MASK_EXPOSURE: u32 = 1 << 15;
    pub(crate) const EVENT_MASK_STRUCTURE_NOTIFY: u32 = 1 << 17;

    pub(crate) const CONFIG_WINDOW_X: u16 = 1 << 0;
    pub(crate) const CONFIG_WINDOW_Y: u16 = 1 << 1;
    pub(crate) const CONFIG_WINDOW_WIDTH: u16 = 1 << 2;
    pub(crate) const CONFIG_WINDOW_HEIGHT: u16 = 1 << 3;

    pub(crate) const PROP_MODE_REPLACE: u8 = 0;
    pub(crate) const ATOM_ATOM: u32 = 4;
    pub(crate) const ATOM_STRING: u32 = 31;
    pub(crate) const ATOM_WM_NAME: u32 = 39;

    pub(crate) const KEY_PRESS: u8 = 2;
    pub(crate) const KEY_RELEASE: u8 = 3;
    pub(crate) const BUTTON_PRESS: u8 = 4;
    pub(crate) const BUTTON_RELEASE: u8 = 5;
    pub(crate) const MOTION_NOTIFY: u8 = 6;
    pub(crate) const LEAVE_NOTIFY: u8 = 8;
    pub(crate) const EXPOSE: u8 = 12;
    pub(crate) const CONFIGURE_NOTIFY: u8 = 22;
    pub(crate) const CLIENT_MESSAGE: u8 = 33;

    pub(crate) const MOD_MASK_SHIFT: u16 = 1 << 0;
    pub(crate) const MOD_MASK_LOCK: u16 = 1 << 1;

    pub(crate) const NO_SYMBOL: u32 = 0;
}
