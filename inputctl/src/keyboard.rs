//! Key names and chords.
//!
//! Chords are written the way people write shortcuts: `ctrl+v`,
//! `shift+insert`, `ctrl+shift+s`. Names are case-insensitive.

use evdev::Key;

use crate::error::{Error, Result};

#[rustfmt::skip]
const NAMED_KEYS: &[(&str, Key)] = &[
    ("ctrl", Key::KEY_LEFTCTRL), ("control", Key::KEY_LEFTCTRL), ("rctrl", Key::KEY_RIGHTCTRL),
    ("shift", Key::KEY_LEFTSHIFT), ("rshift", Key::KEY_RIGHTSHIFT),
    ("alt", Key::KEY_LEFTALT), ("ralt", Key::KEY_RIGHTALT), ("altgr", Key::KEY_RIGHTALT),
    ("super", Key::KEY_LEFTMETA), ("meta", Key::KEY_LEFTMETA), ("win", Key::KEY_LEFTMETA),
    ("enter", Key::KEY_ENTER), ("return", Key::KEY_ENTER),
    ("tab", Key::KEY_TAB), ("space", Key::KEY_SPACE),
    ("escape", Key::KEY_ESC), ("esc", Key::KEY_ESC),
    ("backspace", Key::KEY_BACKSPACE), ("delete", Key::KEY_DELETE), ("insert", Key::KEY_INSERT),
    ("home", Key::KEY_HOME), ("end", Key::KEY_END),
    ("up", Key::KEY_UP), ("down", Key::KEY_DOWN), ("left", Key::KEY_LEFT), ("right", Key::KEY_RIGHT),
    ("f1", Key::KEY_F1), ("f2", Key::KEY_F2), ("f3", Key::KEY_F3), ("f4", Key::KEY_F4),
    ("f5", Key::KEY_F5), ("f6", Key::KEY_F6), ("f7", Key::KEY_F7), ("f8", Key::KEY_F8),
    ("f9", Key::KEY_F9), ("f10", Key::KEY_F10), ("f11", Key::KEY_F11), ("f12", Key::KEY_F12),
];

#[rustfmt::skip]
const CHAR_KEYS: &[(char, Key)] = &[
    ('a', Key::KEY_A), ('b', Key::KEY_B), ('c', Key::KEY_C), ('d', Key::KEY_D), ('e', Key::KEY_E),
    ('f', Key::KEY_F), ('g', Key::KEY_G), ('h', Key::KEY_H), ('i', Key::KEY_I), ('j', Key::KEY_J),
    ('k', Key::KEY_K), ('l', Key::KEY_L), ('m', Key::KEY_M), ('n', Key::KEY_N), ('o', Key::KEY_O),
    ('p', Key::KEY_P), ('q', Key::KEY_Q), ('r', Key::KEY_R), ('s', Key::KEY_S), ('t', Key::KEY_T),
    ('u', Key::KEY_U), ('v', Key::KEY_V), ('w', Key::KEY_W), ('x', Key::KEY_X), ('y', Key::KEY_Y),
    ('z', Key::KEY_Z),
    ('0', Key::KEY_0), ('1', Key::KEY_1), ('2', Key::KEY_2), ('3', Key::KEY_3), ('4', Key::KEY_4),
    ('5', Key::KEY_5), ('6', Key::KEY_6), ('7', Key::KEY_7), ('8', Key::KEY_8), ('9', Key::KEY_9),
];

/// Every key the virtual keyboard can emit.
pub(crate) fn supported_keys() -> impl Iterator<Item = Key> {
    NAMED_KEYS
        .iter()
        .map(|(_, key)| *key)
        .chain(CHAR_KEYS.iter().map(|(_, key)| *key))
}

/// Parse a single key name ("ctrl", "v", "f5") into an evdev Key
pub fn parse_key_name(name: &str) -> Result<Key> {
    let lower = name.trim().to_lowercase();

    if let Some((_, key)) = NAMED_KEYS.iter().find(|(n, _)| *n == lower) {
        return Ok(*key);
    }

    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some((_, key)) = CHAR_KEYS.iter().find(|(k, _)| *k == c) {
            return Ok(*key);
        }
    }

    Err(Error::UnknownKey(name.to_string()))
}

/// Parse a chord such as "ctrl+v" into keys, in press order
pub fn parse_chord(chord: &str) -> Result<Vec<Key>> {
    if chord.trim().is_empty() {
        return Err(Error::EmptyChord);
    }
    chord.split('+').map(parse_key_name).collect()
}
