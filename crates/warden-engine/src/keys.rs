//! Keyboard chords

use std::fmt;

/// Key combination with modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    /// Control held
    pub ctrl: bool,
    /// Shift held
    pub shift: bool,
    /// Alt held
    pub alt: bool,
    /// Meta held
    pub meta: bool,
    /// Key, uppercase for letters
    pub key: char,
}

/// Reserved chord toggling the persisted bypass flag
pub const BYPASS_TOGGLE: KeyChord = KeyChord {
    ctrl: true,
    shift: true,
    alt: false,
    meta: false,
    key: 'B',
};

impl KeyChord {
    /// Plain key with no modifiers
    #[must_use]
    pub fn key(key: char) -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            key: key.to_ascii_uppercase(),
        }
    }

    /// Parse `Ctrl+Shift+B` style text; modifiers are case-insensitive
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts: Vec<&str> = text.split('+').map(str::trim).collect();
        let key_part = parts.pop()?;
        let mut chars = key_part.chars();
        let key = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let mut chord = Self::key(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                _ => return None,
            }
        }
        Some(chord)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (held, name) in [
            (self.ctrl, "Ctrl+"),
            (self.alt, "Alt+"),
            (self.shift, "Shift+"),
            (self.meta, "Meta+"),
        ] {
            if held {
                f.write_str(name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}
