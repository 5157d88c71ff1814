//! Translation of host keyboard keys into what a device understands.
//!
//! Printable characters are mirrored as text (`input text`), everything else
//! as an Android key event (`input keyevent`).

pub mod android;

pub use android::{AndroidKeyCode, KeyCodeError};

use serde::{Deserialize, Serialize};

/// A key observed on the host keyboard while the mirroring surface has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostKey {
    /// A printable character as produced by the host keyboard layout.
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

/// Result of translating a [`HostKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMapping {
    Key(AndroidKeyCode),
    Text(char),
}

/// Unified key mapper.
pub struct KeyMapper;

impl KeyMapper {
    /// Translates a host key.
    ///
    /// Returns `None` for control characters that have no device equivalent.
    pub fn host_to_android(key: HostKey) -> Option<KeyMapping> {
        let code = match key {
            HostKey::Char(' ') => AndroidKeyCode::Space,
            HostKey::Char(c) if c.is_control() => return None,
            HostKey::Char(c) => return Some(KeyMapping::Text(c)),
            HostKey::Enter => AndroidKeyCode::Enter,
            HostKey::Backspace => AndroidKeyCode::Del,
            HostKey::Delete => AndroidKeyCode::ForwardDel,
            HostKey::Tab => AndroidKeyCode::Tab,
            HostKey::Escape => AndroidKeyCode::Back,
            HostKey::Up => AndroidKeyCode::DpadUp,
            HostKey::Down => AndroidKeyCode::DpadDown,
            HostKey::Left => AndroidKeyCode::DpadLeft,
            HostKey::Right => AndroidKeyCode::DpadRight,
            HostKey::Home => AndroidKeyCode::MoveHome,
            HostKey::End => AndroidKeyCode::MoveEnd,
            HostKey::PageUp => AndroidKeyCode::PageUp,
            HostKey::PageDown => AndroidKeyCode::PageDown,
        };
        Some(KeyMapping::Key(code))
    }

    /// Parses a host key name as written in event scripts (`enter`, `left`, …).
    pub fn host_key_from_name(name: &str) -> Option<HostKey> {
        let key = match name.to_ascii_lowercase().as_str() {
            "enter" | "return" => HostKey::Enter,
            "backspace" => HostKey::Backspace,
            "delete" | "del" => HostKey::Delete,
            "tab" => HostKey::Tab,
            "escape" | "esc" => HostKey::Escape,
            "up" => HostKey::Up,
            "down" => HostKey::Down,
            "left" => HostKey::Left,
            "right" => HostKey::Right,
            "home" => HostKey::Home,
            "end" => HostKey::End,
            "pageup" => HostKey::PageUp,
            "pagedown" => HostKey::PageDown,
            "space" => HostKey::Char(' '),
            _ => return None,
        };
        Some(key)
    }
}
