// MIT/Apache2 License

use super::{
    Connection, Cookie, GenericError, GenericEvent, GetGeometryReply, GetKeyboardMappingReply,
    InternAtomReply, ScreenIterator, Setup, TranslateCoordinatesReply, VoidCookie,
    XcbFfi,
};
use crate::{Error, Result};
use libc::{c_char, c_int, c_void};
use libloading::Library;

const LIBRARY: &str = "libxcb.so.1";

pub(crate) struct DynamicFfi {
    _library: Library,
    funcs: Funcs,
}

impl DynamicFfi {
    pub(crate) fn load() -> Result<Self> {
        let library = unsafe { Library::new(LIBRARY) }.map_err(|err| Error::Library {
            library: LIBRARY,
            reason: err.to_string(),
        })?;

        let funcs = unsafe { Funcs::load(&library) }?;

        tracing::debug!("loaded {}", LIBRARY);
        Ok(Self {
            _library: library,
            funcs,
        })
    }
}

macro_rules! define_funcs {
    (
        $($name: ident ($($arg: ident: $arg_ty: ty),*) -> $ret_ty: ty),*
    ) => {
        struct Funcs {
            $(
                $name: unsafe extern "C" fn($($arg_ty),*) -> $ret_ty,
            )*
        }

        impl Funcs {
            unsafe fn load(library: &Library) -> Result<Self> {
                Ok(Self {
                    $(
                    $name: {
                        let symbol = concat!(stringify!($name), "\0").as_bytes();
                        *(library
                            .get::<unsafe extern "C" fn($($arg_ty),*) -> $ret_ty>(symbol)
                            .map_err(|err| Error::Library {
                                library: LIBRARY,
                                reason: format!(
                                    concat!("could not find symbol ", stringify!($name), ": {}"),
                                    err,
                                ),
                            })?)
                    },
                    )*
                })
            }
        }

        unsafe impl XcbFfi for DynamicFfi {
            $(
                unsafe fn $name(&self, $($arg: $arg_ty),*) -> $ret_ty {
                    (self.funcs.$name)($($arg),*)
                }
            )*
        }
    }
}

define_funcs! {
    xcb_connect(display: *const c_char, screenp: *mut c_int) -> *mut Connection,
    xcb_connection_has_error(conn: *mut Connection) -> c_int,
    xcb_disconnect(conn: *mut Connection) -> (),
    xcb_get_file_descriptor(conn: *mut Connection) -> c_int,
    xcb_get_setup(conn: *mut Connection) -> *const Setup,
    xcb_setup_roots_iterator(setup: *const Setup) -> ScreenIterator,
    xcb_screen_next(iter: *mut ScreenIterator) -> (),
    xcb_generate_id(conn: *mut Connection) -> u32,
    xcb_flush(conn: *mut Connection) -> c_int,
    xcb_poll_for_event(conn: *mut Connection) -> *mut GenericEvent,
    xcb_create_window(
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
        value_list: *const c_void
    ) -> VoidCookie,
    xcb_destroy_window(conn: *mut Connection, window: u32) -> VoidCookie,
    xcb_map_window(conn: *mut Connection, window: u32) -> VoidCookie,
    xcb_unmap_window(conn: *mut Connection, window: u32) -> VoidCookie,
    xcb_configure_window(
        conn: *mut Connection,
        window: u32,
        value_mask: u16,
        value_list: *const c_void
    ) -> VoidCookie,
    xcb_change_property(
        conn: *mut Connection,
        mode: u8,
        window: u32,
        property: u32,
        ty: u32,
        format: u8,
        data_len: u32,
        data: *const c_void
    ) -> VoidCookie,
    xcb_delete_property(conn: *mut Connection, window: u32, property: u32) -> VoidCookie,
    xcb_intern_atom(
        conn: *mut Connection,
        only_if_exists: u8,
        name_len: u16,
        name: *const c_char
    ) -> Cookie,
    xcb_intern_atom_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError
    ) -> *mut InternAtomReply,
    xcb_get_geometry(conn: *mut Connection, drawable: u32) -> Cookie,
    xcb_get_geometry_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError
    ) -> *mut GetGeometryReply,
    xcb_translate_coordinates(
        conn: *mut Connection,
        src_window: u32,
        dst_window: u32,
        src_x: i16,
        src_y: i16
    ) -> Cookie,
    xcb_translate_coordinates_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError
    ) -> *mut TranslateCoordinatesReply,
    xcb_get_keyboard_mapping(conn: *mut Connection, first_keycode: u8, count: u8) -> Cookie,
    xcb_get_keyboard_mapping_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError
    ) -> *mut GetKeyboardMappingReply,
    xcb_get_keyboard_mapping_keysyms(reply: *const GetKeyboardMappingReply) -> *mut u32,
    xcb_get_keyboard_mapping_keysyms_length(reply: *const GetKeyboardMappingReply) -> c_int
}
