//! Text-to-Keycode Mapping Tables
//!
//! Maps the UTF-16 code units of typed text to Linux evdev keycodes with a
//! shift tag, assuming a US layout on the destination. The synthetic event
//! stream stays layout-independent; this table is applied at the injection
//! seam, where the platform wants concrete keycodes.

/// Linux evdev keycodes
pub mod keycodes {
    pub const KEY_1: u32 = 2;
    pub const KEY_2: u32 = 3;
    pub const KEY_3: u32 = 4;
    pub const KEY_4: u32 = 5;
    pub const KEY_5: u32 = 6;
    pub const KEY_6: u32 = 7;
    pub const KEY_7: u32 = 8;
    pub const KEY_8: u32 = 9;
    pub const KEY_9: u32 = 10;
    pub const KEY_0: u32 = 11;
    pub const KEY_MINUS: u32 = 12;
    pub const KEY_EQUAL: u32 = 13;
    pub const KEY_TAB: u32 = 15;
    pub const KEY_Q: u32 = 16;
    pub const KEY_W: u32 = 17;
    pub const KEY_E: u32 = 18;
    pub const KEY_R: u32 = 19;
    pub const KEY_T: u32 = 20;
    pub const KEY_Y: u32 = 21;
    pub const KEY_U: u32 = 22;
    pub const KEY_I: u32 = 23;
    pub const KEY_O: u32 = 24;
    pub const KEY_P: u32 = 25;
    pub const KEY_LEFTBRACE: u32 = 26;
    pub const KEY_RIGHTBRACE: u32 = 27;
    pub const KEY_ENTER: u32 = 28;
    pub const KEY_A: u32 = 30;
    pub const KEY_S: u32 = 31;
    pub const KEY_D: u32 = 32;
    pub const KEY_F: u32 = 33;
    pub const KEY_G: u32 = 34;
    pub const KEY_H: u32 = 35;
    pub const KEY_J: u32 = 36;
    pub const KEY_K: u32 = 37;
    pub const KEY_L: u32 = 38;
    pub const KEY_SEMICOLON: u32 = 39;
    pub const KEY_APOSTROPHE: u32 = 40;
    pub const KEY_GRAVE: u32 = 41;
    pub const KEY_LEFTSHIFT: u32 = 42;
    pub const KEY_BACKSLASH: u32 = 43;
    pub const KEY_Z: u32 = 44;
    pub const KEY_X: u32 = 45;
    pub const KEY_C: u32 = 46;
    pub const KEY_V: u32 = 47;
    pub const KEY_B: u32 = 48;
    pub const KEY_N: u32 = 49;
    pub const KEY_M: u32 = 50;
    pub const KEY_COMMA: u32 = 51;
    pub const KEY_DOT: u32 = 52;
    pub const KEY_SLASH: u32 = 53;
    pub const KEY_SPACE: u32 = 57;
}

use keycodes::*;

/// One concrete keystroke: an evdev keycode plus whether shift is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    /// Linux evdev keycode
    pub keycode: u32,
    /// Whether the stroke is produced with shift held
    pub shift: bool,
}

impl KeyStroke {
    fn plain(keycode: u32) -> Self {
        Self {
            keycode,
            shift: false,
        }
    }

    fn shifted(keycode: u32) -> Self {
        Self {
            keycode,
            shift: true,
        }
    }
}

/// US-layout text mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextKeyMapper;

impl TextKeyMapper {
    /// Create a mapper
    pub fn new() -> Self {
        Self
    }

    /// Keystroke producing the given UTF-16 code unit, `None` when the US
    /// layout has no key for it.
    pub fn lookup(&self, unit: u16) -> Option<KeyStroke> {
        let ch = char::from_u32(unit as u32)?;
        let stroke = match ch {
            'a'..='z' => KeyStroke::plain(letter_key(ch)),
            'A'..='Z' => KeyStroke::shifted(letter_key(ch.to_ascii_lowercase())),
            '0' => KeyStroke::plain(KEY_0),
            '1'..='9' => KeyStroke::plain(KEY_1 + (ch as u32 - '1' as u32)),
            ' ' => KeyStroke::plain(KEY_SPACE),
            '\r' => KeyStroke::plain(KEY_ENTER),
            '\t' => KeyStroke::plain(KEY_TAB),
            '-' => KeyStroke::plain(KEY_MINUS),
            '_' => KeyStroke::shifted(KEY_MINUS),
            '=' => KeyStroke::plain(KEY_EQUAL),
            '+' => KeyStroke::shifted(KEY_EQUAL),
            '[' => KeyStroke::plain(KEY_LEFTBRACE),
            '{' => KeyStroke::shifted(KEY_LEFTBRACE),
            ']' => KeyStroke::plain(KEY_RIGHTBRACE),
            '}' => KeyStroke::shifted(KEY_RIGHTBRACE),
            ';' => KeyStroke::plain(KEY_SEMICOLON),
            ':' => KeyStroke::shifted(KEY_SEMICOLON),
            '\'' => KeyStroke::plain(KEY_APOSTROPHE),
            '"' => KeyStroke::shifted(KEY_APOSTROPHE),
            '`' => KeyStroke::plain(KEY_GRAVE),
            '~' => KeyStroke::shifted(KEY_GRAVE),
            '\\' => KeyStroke::plain(KEY_BACKSLASH),
            '|' => KeyStroke::shifted(KEY_BACKSLASH),
            ',' => KeyStroke::plain(KEY_COMMA),
            '<' => KeyStroke::shifted(KEY_COMMA),
            '.' => KeyStroke::plain(KEY_DOT),
            '>' => KeyStroke::shifted(KEY_DOT),
            '/' => KeyStroke::plain(KEY_SLASH),
            '?' => KeyStroke::shifted(KEY_SLASH),
            '!' => KeyStroke::shifted(KEY_1),
            '@' => KeyStroke::shifted(KEY_2),
            '#' => KeyStroke::shifted(KEY_3),
            '$' => KeyStroke::shifted(KEY_4),
            '%' => KeyStroke::shifted(KEY_5),
            '^' => KeyStroke::shifted(KEY_6),
            '&' => KeyStroke::shifted(KEY_7),
            '*' => KeyStroke::shifted(KEY_8),
            '(' => KeyStroke::shifted(KEY_9),
            ')' => KeyStroke::shifted(KEY_0),
            _ => return None,
        };
        Some(stroke)
    }
}

fn letter_key(ch: char) -> u32 {
    match ch {
        'q' => KEY_Q,
        'w' => KEY_W,
        'e' => KEY_E,
        'r' => KEY_R,
        't' => KEY_T,
        'y' => KEY_Y,
        'u' => KEY_U,
        'i' => KEY_I,
        'o' => KEY_O,
        'p' => KEY_P,
        'a' => KEY_A,
        's' => KEY_S,
        'd' => KEY_D,
        'f' => KEY_F,
        'g' => KEY_G,
        'h' => KEY_H,
        'j' => KEY_J,
        'k' => KEY_K,
        'l' => KEY_L,
        'z' => KEY_Z,
        'x' => KEY_X,
        'c' => KEY_C,
        'v' => KEY_V,
        'b' => KEY_B,
        'n' => KEY_N,
        'm' => KEY_M,
        _ => unreachable!("letter_key called with non-letter"),
    }
}
