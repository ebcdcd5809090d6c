//! Keycode to key translation
//!
//! Only the first keysym group is used. Shift selects the second column;
//! Caps Lock inverts the case of letters; Num Lock selects the digit column
//! of the keypad.

use sxlock_core::Key;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, KeyButMask, Keycode, Keysym};

use crate::error::Result;

const NO_SYMBOL: Keysym = 0;

const XK_BACKSPACE: Keysym = 0xff08;
const XK_RETURN: Keysym = 0xff0d;
const XK_ESCAPE: Keysym = 0xff1b;
const XK_KP_SPACE: Keysym = 0xff80;
const XK_KP_ENTER: Keysym = 0xff8d;
const XK_KP_FIRST: Keysym = 0xff80;
const XK_KP_LAST: Keysym = 0xffbd;

const SHIFT: u16 = 1 << 0;
const LOCK: u16 = 1 << 1;
const NUM_LOCK: u16 = 1 << 4;

/// Keysym table of the server's keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    min_keycode: Keycode,
    per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    /// Builds a table from a `GetKeyboardMapping` answer
    pub fn new(min_keycode: Keycode, per_keycode: u8, keysyms: Vec<Keysym>) -> Self {
        Self {
            min_keycode,
            per_keycode: usize::from(per_keycode),
            keysyms,
        }
    }

    /// Fetches the mapping for every keycode of the server
    pub fn load<C: Connection>(conn: &C) -> Result<Self> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(Self::new(min, reply.keysyms_per_keycode, reply.keysyms))
    }

    fn column(&self, keycode: Keycode, column: usize) -> Keysym {
        if keycode < self.min_keycode || column >= self.per_keycode {
            return NO_SYMBOL;
        }
        let row = usize::from(keycode - self.min_keycode) * self.per_keycode;
        self.keysyms.get(row + column).copied().unwrap_or(NO_SYMBOL)
    }

    /// The keysym produced by `keycode` under the modifier `state`
    pub fn keysym(&self, keycode: Keycode, state: u16) -> Keysym {
        let lower = self.column(keycode, 0);
        let mut upper = self.column(keycode, 1);
        if upper == NO_SYMBOL {
            upper = to_upper(lower);
        }

        let shifted = if is_keypad(upper) && state & NUM_LOCK != 0 {
            state & SHIFT == 0
        } else if is_lower_letter(lower) {
            (state & SHIFT != 0) ^ (state & LOCK != 0)
        } else {
            state & SHIFT != 0
        };

        if shifted {
            upper
        } else {
            lower
        }
    }

    /// Translates a key press
    pub fn translate(&self, keycode: Keycode, state: KeyButMask) -> Key {
        key_for(self.keysym(keycode, u16::from(state)))
    }
}

fn is_keypad(keysym: Keysym) -> bool {
    (XK_KP_FIRST..=XK_KP_LAST).contains(&keysym)
}

fn is_lower_letter(keysym: Keysym) -> bool {
    (u32::from(b'a')..=u32::from(b'z')).contains(&keysym)
}

fn to_upper(keysym: Keysym) -> Keysym {
    if is_lower_letter(keysym) {
        keysym - 0x20
    } else {
        keysym
    }
}

/// Maps a keysym to the key the lock loop understands
pub fn key_for(keysym: Keysym) -> Key {
    match keysym {
        XK_RETURN | XK_KP_ENTER => Key::Enter,
        XK_ESCAPE => Key::Escape,
        XK_BACKSPACE => Key::Backspace,
        0x20..=0x7e => Key::Char(keysym as u8),
        XK_KP_SPACE => Key::Char(b' '),
        0xffaa => Key::Char(b'*'),
        0xffab => Key::Char(b'+'),
        0xffad => Key::Char(b'-'),
        0xffae => Key::Char(b'.'),
        0xffaf => Key::Char(b'/'),
        0xffb0..=0xffb9 => Key::Char(b'0' + (keysym - 0xffb0) as u8),
        0xffbd => Key::Char(b'='),
        _ => Key::Other,
    }
}
