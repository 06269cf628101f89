//! Key event encoding.
//!
//! Only unchorded keys are encoded. Anything held with ctrl, meta or alt is
//! left to the host so application shortcuts keep working.

use serde::{Deserialize, Serialize};

/// Named (non-printable) keys with a fixed terminal sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowRight,
    ArrowLeft,
    Home,
    End,
    PageUp,
    PageDown,
}

impl NamedKey {
    /// Canonical control sequence for this key
    pub fn sequence(self) -> &'static str {
        match self {
            NamedKey::Enter => "\r",
            NamedKey::Tab => "\t",
            NamedKey::Backspace => "\x7f",
            NamedKey::Escape => "\x1b",
            NamedKey::Delete => "\x1b[3~",

            // Arrow keys
            NamedKey::ArrowUp => "\x1b[A",
            NamedKey::ArrowDown => "\x1b[B",
            NamedKey::ArrowRight => "\x1b[C",
            NamedKey::ArrowLeft => "\x1b[D",

            // Navigation keys
            NamedKey::Home => "\x1b[H",
            NamedKey::End => "\x1b[F",
            NamedKey::PageUp => "\x1b[5~",
            NamedKey::PageDown => "\x1b[6~",
        }
    }

    /// Look up a key by its host name (`"Enter"`, `"ArrowUp"`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "Enter" => NamedKey::Enter,
            "Tab" => NamedKey::Tab,
            "Backspace" => NamedKey::Backspace,
            "Escape" | "Esc" => NamedKey::Escape,
            "Delete" | "Del" => NamedKey::Delete,
            "ArrowUp" | "Up" => NamedKey::ArrowUp,
            "ArrowDown" | "Down" => NamedKey::ArrowDown,
            "ArrowRight" | "Right" => NamedKey::ArrowRight,
            "ArrowLeft" | "Left" => NamedKey::ArrowLeft,
            "Home" => NamedKey::Home,
            "End" => NamedKey::End,
            "PageUp" => NamedKey::PageUp,
            "PageDown" => NamedKey::PageDown,
            _ => return None,
        };
        Some(key)
    }
}

/// Logical key of an input event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// Text produced by the key (usually one character)
    Character(String),
    /// Named special key
    Named(NamedKey),
    /// Anything the host reported that has no encoding
    Unidentified,
}

impl Key {
    /// Parse a host key name: a named key, a single character, or unidentified
    pub fn parse(name: &str) -> Self {
        if let Some(named) = NamedKey::from_name(name) {
            return Key::Named(named);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(_), None) => Key::Character(name.to_string()),
            _ => Key::Unidentified,
        }
    }
}

/// Modifier keys held during an input event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    /// Whether a chord modifier (ctrl, meta, alt) is held; shift alone is not a chord
    pub fn is_chord(&self) -> bool {
        self.ctrl || self.meta || self.alt
    }
}

/// A key event as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Unmodified key
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::default())
    }
}

/// Encode a key event as terminal input.
///
/// Returns `None` for chorded keys, multi-character text, control characters
/// and unidentified keys.
pub fn encode_terminal_key_input(input: &KeyInput) -> Option<String> {
    if input.modifiers.is_chord() {
        log::trace!("Key {:?} left to host (chorded)", input.key);
        return None;
    }

    match &input.key {
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if !ch.is_control() => Some(text.clone()),
                _ => None,
            }
        }
        Key::Named(named) => Some(named.sequence().to_string()),
        Key::Unidentified => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(key: Key, ctrl: bool, meta: bool, alt: bool) -> KeyInput {
        KeyInput::new(
            key,
            Modifiers {
                ctrl,
                meta,
                alt,
                shift: false,
            },
        )
    }

    #[test]
    fn test_named_keys_unmodified() {
        let cases = [
            (NamedKey::Enter, "\r"),
            (NamedKey::Backspace, "\x7f"),
            (NamedKey::Tab, "\t"),
            (NamedKey::ArrowUp, "\x1b[A"),
            (NamedKey::ArrowDown, "\x1b[B"),
            (NamedKey::ArrowRight, "\x1b[C"),
            (NamedKey::ArrowLeft, "\x1b[D"),
            (NamedKey::Home, "\x1b[H"),
            (NamedKey::End, "\x1b[F"),
            (NamedKey::Delete, "\x1b[3~"),
            (NamedKey::PageUp, "\x1b[5~"),
            (NamedKey::PageDown, "\x1b[6~"),
            (NamedKey::Escape, "\x1b"),
        ];
        for (key, expected) in cases {
            let encoded = encode_terminal_key_input(&KeyInput::plain(Key::Named(key)));
            assert_eq!(encoded.as_deref(), Some(expected), "{key:?}");
        }
    }

    #[test]
    fn test_chorded_keys_never_encoded() {
        let keys = [
            Key::Character("c".to_string()),
            Key::Named(NamedKey::Enter),
            Key::Named(NamedKey::ArrowLeft),
        ];
        for key in keys {
            assert_eq!(encode_terminal_key_input(&chord(key.clone(), true, false, false)), None);
            assert_eq!(encode_terminal_key_input(&chord(key.clone(), false, true, false)), None);
            assert_eq!(encode_terminal_key_input(&chord(key, false, false, true)), None);
        }
    }

    #[test]
    fn test_printable_passthrough() {
        assert_eq!(
            encode_terminal_key_input(&KeyInput::plain(Key::Character("a".to_string()))).as_deref(),
            Some("a")
        );
        assert_eq!(
            encode_terminal_key_input(&KeyInput::plain(Key::Character("é".to_string()))).as_deref(),
            Some("é")
        );
    }

    #[test]
    fn test_shift_is_not_a_chord() {
        let input = KeyInput::new(
            Key::Character("A".to_string()),
            Modifiers {
                shift: true,
                ..Modifiers::default()
            },
        );
        assert_eq!(encode_terminal_key_input(&input).as_deref(), Some("A"));
    }

    #[test]
    fn test_unencodable_keys() {
        assert_eq!(encode_terminal_key_input(&KeyInput::plain(Key::Unidentified)), None);
        assert_eq!(
            encode_terminal_key_input(&KeyInput::plain(Key::Character("ab".to_string()))),
            None
        );
        assert_eq!(
            encode_terminal_key_input(&KeyInput::plain(Key::Character("\u{7}".to_string()))),
            None
        );
    }

    #[test]
    fn test_host_payload_deserializes() {
        let input: KeyInput =
            serde_json::from_str(r#"{"key":{"Named":"ArrowUp"},"modifiers":{"alt":true}}"#).unwrap();
        assert_eq!(input.key, Key::Named(NamedKey::ArrowUp));
        assert!(input.modifiers.alt);
        assert!(!input.modifiers.ctrl);
        assert_eq!(encode_terminal_key_input(&input), None);
    }

    #[test]
    fn test_parse_host_names() {
        assert_eq!(Key::parse("Enter"), Key::Named(NamedKey::Enter));
        assert_eq!(Key::parse("Esc"), Key::Named(NamedKey::Escape));
        assert_eq!(Key::parse("x"), Key::Character("x".to_string()));
        assert_eq!(Key::parse("F13"), Key::Unidentified);
        assert_eq!(Key::parse(""), Key::Unidentified);
    }
}
