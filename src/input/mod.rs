//! Input vocabulary shared by the compiler, the dispatcher and the backends.
//!
//! - `Flag`: what happened to a key or button (down, up, mouse variants, or unset).
//! - `Input`: a `(key code, flag)` pair. Doubles as the dispatcher's match signature.
//! - `InputSpec`: an ordered list of inputs resolved from an expression value.
//! - `lexicon`: human-readable names -> inputs.
//! - `parse`: value grammars for inputs, frequencies and durations.

use serde::{Deserialize, Serialize};

pub mod lexicon;
pub mod parse;

pub use lexicon::lookup;
pub use parse::{Frequency, parse_duration, parse_frequency, parse_input};

/// Virtual key code as understood by the injection backend.
pub type KeyCode = u16;

/// Key codes for every named input in the lexicon.
///
/// Values follow the Windows virtual-key table, which is also what enigo's `raw`
/// keycodes expect on that platform.
pub mod vk {
    use super::KeyCode;

    pub const LEFT_BUTTON: KeyCode = 0x01;
    pub const RIGHT_BUTTON: KeyCode = 0x02;
    pub const BACKSPACE: KeyCode = 0x08;
    pub const TAB: KeyCode = 0x09;
    pub const ENTER: KeyCode = 0x0D;
    pub const SHIFT: KeyCode = 0x10;
    pub const CTRL: KeyCode = 0x11;
    pub const ALT: KeyCode = 0x12;
    pub const ESC: KeyCode = 0x1B;
    pub const SPACE: KeyCode = 0x20;
    pub const END: KeyCode = 0x23;
    pub const HOME: KeyCode = 0x24;
    pub const LEFT: KeyCode = 0x25;
    pub const UP: KeyCode = 0x26;
    pub const RIGHT: KeyCode = 0x27;
    pub const DOWN: KeyCode = 0x28;
    pub const DELETE: KeyCode = 0x2E;
    /// `'0'`; digits are contiguous.
    pub const DIGIT_0: KeyCode = 0x30;
    /// `'A'`; letters are contiguous.
    pub const LETTER_A: KeyCode = 0x41;
    pub const NUMPAD_0: KeyCode = 0x60;
    pub const F1: KeyCode = 0x70;
    pub const F24: KeyCode = 0x87;
    pub const LEFT_SHIFT: KeyCode = 0xA0;
    pub const RIGHT_SHIFT: KeyCode = 0xA1;
    pub const LEFT_CTRL: KeyCode = 0xA2;
    pub const RIGHT_CTRL: KeyCode = 0xA3;
    pub const LEFT_ALT: KeyCode = 0xA4;
    pub const RIGHT_ALT: KeyCode = 0xA5;
}

/// Transition carried by an input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// No transition chosen yet; the evaluating context supplies a default.
    Unset,
    KeyDown,
    KeyUp,
    MouseLeftDown,
    MouseLeftUp,
    MouseRightDown,
    MouseRightUp,
}

impl Flag {
    /// Specialize a generic key flag for `key`.
    ///
    /// Mouse buttons live in the key table as `LEFT_BUTTON`/`RIGHT_BUTTON`; their
    /// down/up transitions are the mouse flags rather than `KeyDown`/`KeyUp`.
    pub fn for_key(self, key: KeyCode) -> Self {
        match (self, key) {
            (Self::KeyDown, vk::LEFT_BUTTON) => Self::MouseLeftDown,
            (Self::KeyUp, vk::LEFT_BUTTON) => Self::MouseLeftUp,
            (Self::KeyDown, vk::RIGHT_BUTTON) => Self::MouseRightDown,
            (Self::KeyUp, vk::RIGHT_BUTTON) => Self::MouseRightUp,
            (flag, _) => flag,
        }
    }

    /// True for the four mouse transitions.
    pub fn is_mouse(self) -> bool {
        matches!(
            self,
            Self::MouseLeftDown | Self::MouseLeftUp | Self::MouseRightDown | Self::MouseRightUp
        )
    }
}

/// A single key or button transition.
///
/// Observed events and trigger registrations use the same type; matching is exact
/// on both fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub key: KeyCode,
    pub flag: Flag,
}

impl Input {
    pub const fn new(key: KeyCode, flag: Flag) -> Self {
        Self { key, flag }
    }

    /// Fill an unset flag with `default`, leaving explicit flags untouched.
    pub fn with_default(self, default: Flag) -> Self {
        if self.flag == Flag::Unset {
            Self::new(self.key, default.for_key(self.key))
        } else {
            self
        }
    }

    pub fn is_unset(&self) -> bool {
        self.flag == Flag::Unset
    }

    /// The transition sent for this input on the down pass of a press.
    pub fn pressed(self) -> Self {
        self.with_default(Flag::KeyDown)
    }

    /// The transition sent for this input on the up pass of a press.
    pub fn released(self) -> Self {
        self.with_default(Flag::KeyUp)
    }
}

/// Ordered inputs resolved from one expression value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSpec(Vec<Input>);

impl InputSpec {
    pub fn new(inputs: Vec<Input>) -> Self {
        Self(inputs)
    }

    pub fn inputs(&self) -> &[Input] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Input> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, input: Input) {
        self.0.push(input);
    }
}

impl From<Vec<Input>> for InputSpec {
    fn from(inputs: Vec<Input>) -> Self {
        Self(inputs)
    }
}

impl<'a> IntoIterator for &'a InputSpec {
    type Item = &'a Input;
    type IntoIter = std::slice::Iter<'a, Input>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_flags_follow_button() {
        let left = Input::new(vk::LEFT_BUTTON, Flag::Unset);
        assert_eq!(left.pressed().flag, Flag::MouseLeftDown);
        assert_eq!(left.released().flag, Flag::MouseLeftUp);

        let right = Input::new(vk::RIGHT_BUTTON, Flag::Unset);
        assert_eq!(right.pressed().flag, Flag::MouseRightDown);
        assert_eq!(right.released().flag, Flag::MouseRightUp);
    }

    #[test]
    fn test_explicit_flag_is_kept() {
        let a_up = Input::new(vk::LETTER_A, Flag::KeyUp);
        assert_eq!(a_up.pressed(), a_up);
        assert_eq!(a_up.with_default(Flag::KeyDown), a_up);
    }
}
