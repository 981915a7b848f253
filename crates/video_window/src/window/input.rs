//! Keyboard and mouse types

use bitflags::bitflags;

/// Keyboard key, identified by the toolkit's key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub i32);

impl Key {
    /// Key code the toolkit could not identify
    pub const UNKNOWN: Self = Self(-1);
    /// Space bar
    pub const SPACE: Self = Self(32);
    /// Escape
    pub const ESCAPE: Self = Self(256);
    /// Enter
    pub const ENTER: Self = Self(257);
    /// Tab
    pub const TAB: Self = Self(258);
    /// Right arrow
    pub const RIGHT: Self = Self(262);
    /// Left arrow
    pub const LEFT: Self = Self(263);
    /// Down arrow
    pub const DOWN: Self = Self(264);
    /// Up arrow
    pub const UP: Self = Self(265);
    /// F11
    pub const F11: Self = Self(300);

    /// Letter key `A`..=`Z` (case-insensitive), if `c` is a letter
    pub fn letter(c: char) -> Option<Self> {
        c.is_ascii_alphabetic()
            .then(|| Self(i32::from(c.to_ascii_uppercase() as u8)))
    }
}

/// State transition of a key or button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyAction {
    /// Not pressed / just released
    #[default]
    Release,
    /// Just pressed or held
    Press,
    /// Held long enough to auto-repeat
    Repeat,
}

impl KeyAction {
    /// Convert the toolkit's numeric action
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Press,
            2 => Self::Repeat,
            _ => Self::Release,
        }
    }

    /// Whether the key is down
    pub fn is_down(self) -> bool {
        self != Self::Release
    }
}

/// Mouse button, identified by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(pub u8);

impl MouseButton {
    /// Primary button
    pub const LEFT: Self = Self(0);
    /// Secondary button
    pub const RIGHT: Self = Self(1);
    /// Wheel button
    pub const MIDDLE: Self = Self(2);
}

bitflags! {
    /// Modifier keys held during an input event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        /// Either shift key
        const SHIFT = 0x01;
        /// Either control key
        const CONTROL = 0x02;
        /// Either alt key
        const ALT = 0x04;
        /// Either super/command key
        const SUPER = 0x08;
        /// Caps lock active
        const CAPS_LOCK = 0x10;
        /// Num lock active
        const NUM_LOCK = 0x20;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_keys() {
        assert_eq!(Key::letter('a'), Some(Key(65)));
        assert_eq!(Key::letter('Z'), Some(Key(90)));
        assert_eq!(Key::letter('1'), None);
    }

    #[test]
    fn test_key_action_from_raw() {
        assert_eq!(KeyAction::from_raw(0), KeyAction::Release);
        assert_eq!(KeyAction::from_raw(1), KeyAction::Press);
        assert!(KeyAction::from_raw(2).is_down());
    }
}
