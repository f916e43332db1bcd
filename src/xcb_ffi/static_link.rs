// MIT/Apache2 License

#![cfg(feature = "static")]

use super::{
    Connection, Cookie, GenericError, GenericEvent, GetGeometryReply, GetKeyboardMappingReply,
    InternAtomReply, ScreenIterator, Setup, TranslateCoordinatesReply, VoidCookie, XcbFfi,
};
use crate::Result;
use libc::{c_char, c_int, c_void};

pub(crate) struct StaticFfi;

impl StaticFfi {
    pub(crate) fn load() -> Result<Self> {
        Ok(StaticFfi)
    }
}

unsafe impl XcbFfi for StaticFfi {
    unsafe fn xcb_connect(&self, display: *const c_char, screenp: *mut c_int) -> *mut Connection {
        xcb_connect(display, screenp)
    }

    unsafe fn xcb_connection_has_error(&self, conn: *mut Connection) -> c_int {
        xcb_connection_has_error(conn)
    }

    unsafe fn xcb_disconnect(&self, conn: *mut Connection) {
        xcb_disconnect(conn)
    }

    unsafe fn xcb_get_file_descriptor(&self, conn: *mut Connection) -> c_int {
        xcb_get_file_descriptor(conn)
    }

    unsafe fn xcb_get_setup(&self, conn: *mut Connection) -> *const Setup {
        xcb_get_setup(conn)
    }

    unsafe fn xcb_setup_roots_iterator(&self, setup: *const Setup) -> ScreenIterator {
        xcb_setup_roots_iterator(setup)
    }

    unsafe fn xcb_screen_next(&self, iter: *mut ScreenIterator) {
        xcb_screen_next(iter)
    }

    unsafe fn xcb_generate_id(&self, conn: *mut Connection) -> u32 {
        xcb_generate_id(conn)
    }

    unsafe fn xcb_flush(&self, conn: *mut Connection) -> c_int {
        xcb_flush(conn)
    }

    unsafe fn xcb_poll_for_event(&self, conn: *mut Connection) -> *mut GenericEvent {
        xcb_poll_for_event(conn)
    }

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
    ) -> VoidCookie {
        xcb_create_window(
            conn,
            depth,
            wid,
            parent,
            x,
            y,
            width,
            height,
            border_width,
            class,
            visual,
            value_mask,
            value_list,
        )
    }

    unsafe fn xcb_destroy_window(&self, conn: *mut Connection, window: u32) -> VoidCookie {
        xcb_destroy_window(conn, window)
    }

    unsafe fn xcb_map_window(&self, conn: *mut Connection, window: u32) -> VoidCookie {
        xcb_map_window(conn, window)
    }

    unsafe fn xcb_unmap_window(&self, conn: *mut Connection, window: u32) -> VoidCookie {
        xcb_unmap_window(conn, window)
    }

    unsafe fn xcb_configure_window(
        &self,
        conn: *mut Connection,
        window: u32,
        value_mask: u16,
        value_list: *const c_void,
    ) -> VoidCookie {
        xcb_configure_window(conn, window, value_mask, value_list)
    }

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
    ) -> VoidCookie {
        xcb_change_property(conn, mode, window, property, ty, format, data_len, data)
    }

    unsafe fn xcb_delete_property(
        &self,
        conn: *mut Connection,
        window: u32,
        property: u32,
    ) -> VoidCookie {
        xcb_delete_property(conn, window, property)
    }

    unsafe fn xcb_intern_atom(
        &self,
        conn: *mut Connection,
        only_if_exists: u8,
        name_len: u16,
        name: *const c_char,
    ) -> Cookie {
        xcb_intern_atom(conn, only_if_exists, name_len, name)
    }

    unsafe fn xcb_intern_atom_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut InternAtomReply {
        xcb_intern_atom_reply(conn, cookie, error)
    }

    unsafe fn xcb_get_geometry(&self, conn: *mut Connection, drawable: u32) -> Cookie {
        xcb_get_geometry(conn, drawable)
    }

    unsafe fn xcb_get_geometry_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetGeometryReply {
        xcb_get_geometry_reply(conn, cookie, error)
    }

    unsafe fn xcb_translate_coordinates(
        &self,
        conn: *mut Connection,
        src_window: u32,
        dst_window: u32,
        src_x: i16,
        src_y: i16,
    ) -> Cookie {
        xcb_translate_coordinates(conn, src_window, dst_window, src_x, src_y)
    }

    unsafe fn xcb_translate_coordinates_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut TranslateCoordinatesReply {
        xcb_translate_coordinates_reply(conn, cookie, error)
    }

    unsafe fn xcb_get_keyboard_mapping(
        &self,
        conn: *mut Connection,
        first_keycode: u8,
        count: u8,
    ) -> Cookie {
        xcb_get_keyboard_mapping(conn, first_keycode, count)
    }

    unsafe fn xcb_get_keyboard_mapping_reply(
        &self,
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetKeyboardMappingReply {
        xcb_get_keyboard_mapping_reply(conn, cookie, error)
    }

    unsafe fn xcb_get_keyboard_mapping_keysyms(
        &self,
        reply: *const GetKeyboardMappingReply,
    ) -> *mut u32 {
        xcb_get_keyboard_mapping_keysyms(reply)
    }

    unsafe fn xcb_get_keyboard_mapping_keysyms_length(
        &self,
        reply: *const GetKeyboardMappingReply,
    ) -> c_int {
        xcb_get_keyboard_mapping_keysyms_length(reply)
    }
}

// actual import
#[link(name = "xcb")]
extern "C" {
    fn xcb_connect(display: *const c_char, screenp: *mut c_int) -> *mut Connection;
    fn xcb_connection_has_error(conn: *mut Connection) -> c_int;
    fn xcb_disconnect(conn: *mut Connection);
    fn xcb_get_file_descriptor(conn: *mut Connection) -> c_int;
    fn xcb_get_setup(conn: *mut Connection) -> *const Setup;
    fn xcb_setup_roots_iterator(setup: *const Setup) -> ScreenIterator;
    fn xcb_screen_next(iter: *mut ScreenIterator);
    fn xcb_generate_id(conn: *mut Connection) -> u32;
    fn xcb_flush(conn: *mut Connection) -> c_int;
    fn xcb_poll_for_event(conn: *mut Connection) -> *mut GenericEvent;
    fn xcb_create_window(
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
    fn xcb_destroy_window(conn: *mut Connection, window: u32) -> VoidCookie;
    fn xcb_map_window(conn: *mut Connection, window: u32) -> VoidCookie;
    fn xcb_unmap_window(conn: *mut Connection, window: u32) -> VoidCookie;
    fn xcb_configure_window(
        conn: *mut Connection,
        window: u32,
        value_mask: u16,
        value_list: *const c_void,
    ) -> VoidCookie;
    fn xcb_change_property(
        conn: *mut Connection,
        mode: u8,
        window: u32,
        property: u32,
        ty: u32,
        format: u8,
        data_len: u32,
        data: *const c_void,
    ) -> VoidCookie;
    fn xcb_delete_property(conn: *mut Connection, window: u32, property: u32) -> VoidCookie;
    fn xcb_intern_atom(
        conn: *mut Connection,
        only_if_exists: u8,
        name_len: u16,
        name: *const c_char,
    ) -> Cookie;
    fn xcb_intern_atom_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut InternAtomReply;
    fn xcb_get_geometry(conn: *mut Connection, drawable: u32) -> Cookie;
    fn xcb_get_geometry_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetGeometryReply;
    fn xcb_translate_coordinates(
        conn: *mut Connection,
        src_window: u32,
        dst_window: u32,
        src_x: i16,
        src_y: i16,
    ) -> Cookie;
    fn xcb_translate_coordinates_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut TranslateCoordinatesReply;
    fn xcb_get_keyboard_mapping(conn: *mut Connection, first_keycode: u8, count: u8) -> Cookie;
    fn xcb_get_keyboard_mapping_reply(
        conn: *mut Connection,
        cookie: Cookie,
        error: *mut *mut GenericError,
    ) -> *mut GetKeyboardMappingReply;
    fn xcb_get_keyboard_mapping_keysyms(reply: *const GetKeyboardMappingReply) -> *mut u32;
    fn xcb_get_keyboard_mapping_keysyms_length(reply: *const GetKeyboardMappingReply) -> c_int;
}
