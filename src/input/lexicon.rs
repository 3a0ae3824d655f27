//! Human-readable input names.
//!
//! Every name resolves to an `Input` with an unset flag, and additionally accepts a
//! ` down` or ` up` suffix that fixes the flag. Lookups are case-insensitive and
//! ignore surrounding whitespace.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{Flag, Input, KeyCode, vk};

static LEXICON: Lazy<HashMap<String, Input>> = Lazy::new(build);

/// Named keys in PascalCase; the lexicon stores their space-separated lower-case form.
const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("Alt", vk::ALT),
    ("LeftAlt", vk::LEFT_ALT),
    ("RightAlt", vk::RIGHT_ALT),
    ("Ctrl", vk::CTRL),
    ("LeftCtrl", vk::LEFT_CTRL),
    ("RightCtrl", vk::RIGHT_CTRL),
    ("Shift", vk::SHIFT),
    ("LeftShift", vk::LEFT_SHIFT),
    ("RightShift", vk::RIGHT_SHIFT),
    ("Enter", vk::ENTER),
    ("Esc", vk::ESC),
    ("Space", vk::SPACE),
    ("Tab", vk::TAB),
    ("Backspace", vk::BACKSPACE),
    ("Delete", vk::DELETE),
    ("Left", vk::LEFT),
    ("Up", vk::UP),
    ("Right", vk::RIGHT),
    ("Down", vk::DOWN),
    ("End", vk::END),
    ("Home", vk::HOME),
    ("LeftClick", vk::LEFT_BUTTON),
    ("RightClick", vk::RIGHT_BUTTON),
];

/// Resolve `name` to an input, honoring a trailing ` down` / ` up`.
pub fn lookup(name: &str) -> Option<Input> {
    LEXICON.get(name.trim().to_lowercase().as_str()).copied()
}

/// Number of names (including suffixed forms) the lexicon recognizes.
pub fn len() -> usize {
    LEXICON.len()
}

fn build() -> HashMap<String, Input> {
    let mut base: Vec<(String, KeyCode)> = Vec::new();

    for (i, c) in ('0'..='9').enumerate() {
        base.push((c.to_string(), vk::DIGIT_0 + i as KeyCode));
    }
    for (i, c) in ('a'..='z').enumerate() {
        base.push((c.to_string(), vk::LETTER_A + i as KeyCode));
    }
    for n in 1..=(vk::F24 - vk::F1 + 1) {
        base.push((format!("f{n}"), vk::F1 + n - 1));
    }
    for n in 0..10 {
        base.push((format!("numpad {n}"), vk::NUMPAD_0 + n));
    }
    for (name, key) in NAMED_KEYS {
        base.push((colloquial(name), *key));
    }

    let mut map = HashMap::with_capacity(base.len() * 3);
    for (name, key) in base {
        map.insert(format!("{name} down"), Input::new(key, Flag::KeyDown.for_key(key)));
        map.insert(format!("{name} up"), Input::new(key, Flag::KeyUp.for_key(key)));
        map.insert(name, Input::new(key, Flag::Unset));
    }
    map
}

/// `LeftCtrl` -> `left ctrl`.
fn colloquial(pascal: &str) -> String {
    let mut out = String::with_capacity(pascal.len() + 4);
    for (i, c) in pascal.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colloquial() {
        assert_eq!(colloquial("LeftCtrl"), "left ctrl");
        assert_eq!(colloquial("Esc"), "esc");
        assert_eq!(colloquial("RightClick"), "right click");
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(lookup("a"), Some(Input::new(0x41, Flag::Unset)));
        assert_eq!(lookup("Z"), Some(Input::new(0x5A, Flag::Unset)));
        assert_eq!(lookup("7"), Some(Input::new(0x37, Flag::Unset)));
    }

    #[test]
    fn test_suffixes_fix_the_flag() {
        assert_eq!(lookup("a down"), Some(Input::new(0x41, Flag::KeyDown)));
        assert_eq!(lookup("A Up"), Some(Input::new(0x41, Flag::KeyUp)));
        assert_eq!(
            lookup("left ctrl down"),
            Some(Input::new(vk::LEFT_CTRL, Flag::KeyDown))
        );
    }

    #[test]
    fn test_function_keys_and_numpad() {
        assert_eq!(lookup("f1").map(|i| i.key), Some(vk::F1));
        assert_eq!(lookup("F12").map(|i| i.key), Some(0x7B));
        assert_eq!(lookup("f24").map(|i| i.key), Some(vk::F24));
        assert!(lookup("f25").is_none());
        assert_eq!(lookup("numpad 5").map(|i| i.key), Some(0x65));
    }

    #[test]
    fn test_mouse_names() {
        assert_eq!(
            lookup("left click"),
            Some(Input::new(vk::LEFT_BUTTON, Flag::Unset))
        );
        assert_eq!(
            lookup("left click down"),
            Some(Input::new(vk::LEFT_BUTTON, Flag::MouseLeftDown))
        );
        assert_eq!(
            lookup("right click up"),
            Some(Input::new(vk::RIGHT_BUTTON, Flag::MouseRightUp))
        );
    }

    #[test]
    fn test_unknown_names() {
        assert!(lookup("banana").is_none());
        assert!(lookup("").is_none());
        assert!(lookup("a sideways").is_none());
    }
}
