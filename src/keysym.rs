// MIT/Apache2 License

//! Turning X key codes into text.

use crate::xcb_ffi::xproto::{MOD_MASK_LOCK, MOD_MASK_SHIFT, NO_SYMBOL};

/// The server's key code to keysym table, as returned by
/// `GetKeyboardMapping`.
#[derive(Debug, Default)]
pub(crate) struct Keymap {
    min_keycode: u8,
    per_keycode: usize,
    keysyms: Vec<u32>,
}

impl Keymap {
    pub(crate) fn new(min_keycode: u8, per_keycode: u8, keysyms: Vec<u32>) -> Self {
        Self {
            min_keycode,
            per_keycode: usize::from(per_keycode),
            keysyms,
        }
    }

    fn keysym(&self, keycode: u8, column: usize) -> u32 {
        if column >= self.per_keycode || keycode < self.min_keycode {
            return NO_SYMBOL;
        }

        let row = usize::from(keycode - self.min_keycode);
        self.keysyms
            .get(row * self.per_keycode + column)
            .copied()
            .unwrap_or(NO_SYMBOL)
    }

    /// The character a key press produces under the modifier `state`, if
    /// it produces one.
    pub(crate) fn text(&self, keycode: u8, state: u16) -> Option<char> {
        let shift = state & MOD_MASK_SHIFT != 0;
        let lock = state & MOD_MASK_LOCK != 0;

        let lower = self.keysym(keycode, 0);
        let upper = match self.keysym(keycode, 1) {
            NO_SYMBOL => lower,
            upper => upper,
        };

        let base = keysym_to_char(lower)?;
        if base.is_alphabetic() {
            // caps lock only affects letters, and shift undoes it
            if shift != lock {
                keysym_to_char(upper).map(|c| c.to_uppercase().next().unwrap_or(c))
            } else {
                Some(base)
            }
        } else if shift {
            keysym_to_char(upper)
        } else {
            Some(base)
        }
    }
}

/// Map a keysym to the printable character it names.
pub(crate) fn keysym_to_char(keysym: u32) -> Option<char> {
    match keysym {
        // Latin-1 keysyms are their own code points
        0x20..=0x7e | 0xa0..=0xff => char::from_u32(keysym),
        // direct Unicode keysyms
        0x0100_00a0..=0x0110_ffff => char::from_u32(keysym & 0x00ff_ffff),
        _ => None,
    }
}
