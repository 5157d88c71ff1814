//! Android `KeyEvent` key codes accepted by `input keyevent`.
//!
//! Only the codes an operator realistically mirrors are named; anything else
//! is carried as [`AndroidKeyCode::Other`] with its numeric value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a key name cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyCodeError {
    #[error("unknown key code name: {0}")]
    UnknownName(String),
    #[error("key code name is empty")]
    Empty,
}

/// An Android key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AndroidKeyCode {
    Home,
    Back,
    Call,
    EndCall,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    DpadCenter,
    VolumeUp,
    VolumeDown,
    Power,
    Camera,
    Tab,
    Space,
    Enter,
    Del,
    Menu,
    Search,
    MediaPlayPause,
    PageUp,
    PageDown,
    Escape,
    ForwardDel,
    MoveHome,
    MoveEnd,
    AppSwitch,
    Sleep,
    Wakeup,
    /// A code without a named variant.
    Other(u16),
}

/// `(variant, numeric code, name without the KEYCODE_ prefix)`.
const TABLE: &[(AndroidKeyCode, u16, &str)] = &[
    (AndroidKeyCode::Home, 3, "HOME"),
    (AndroidKeyCode::Back, 4, "BACK"),
    (AndroidKeyCode::Call, 5, "CALL"),
    (AndroidKeyCode::EndCall, 6, "ENDCALL"),
    (AndroidKeyCode::DpadUp, 19, "DPAD_UP"),
    (AndroidKeyCode::DpadDown, 20, "DPAD_DOWN"),
    (AndroidKeyCode::DpadLeft, 21, "DPAD_LEFT"),
    (AndroidKeyCode::DpadRight, 22, "DPAD_RIGHT"),
    (AndroidKeyCode::DpadCenter, 23, "DPAD_CENTER"),
    (AndroidKeyCode::VolumeUp, 24, "VOLUME_UP"),
    (AndroidKeyCode::VolumeDown, 25, "VOLUME_DOWN"),
    (AndroidKeyCode::Power, 26, "POWER"),
    (AndroidKeyCode::Camera, 27, "CAMERA"),
    (AndroidKeyCode::Tab, 61, "TAB"),
    (AndroidKeyCode::Space, 62, "SPACE"),
    (AndroidKeyCode::Enter, 66, "ENTER"),
    (AndroidKeyCode::Del, 67, "DEL"),
    (AndroidKeyCode::Menu, 82, "MENU"),
    (AndroidKeyCode::Search, 84, "SEARCH"),
    (AndroidKeyCode::MediaPlayPause, 85, "MEDIA_PLAY_PAUSE"),
    (AndroidKeyCode::PageUp, 92, "PAGE_UP"),
    (AndroidKeyCode::PageDown, 93, "PAGE_DOWN"),
    (AndroidKeyCode::Escape, 111, "ESCAPE"),
    (AndroidKeyCode::ForwardDel, 112, "FORWARD_DEL"),
    (AndroidKeyCode::MoveHome, 122, "MOVE_HOME"),
    (AndroidKeyCode::MoveEnd, 123, "MOVE_END"),
    (AndroidKeyCode::AppSwitch, 187, "APP_SWITCH"),
    (AndroidKeyCode::Sleep, 223, "SLEEP"),
    (AndroidKeyCode::Wakeup, 224, "WAKEUP"),
];

impl AndroidKeyCode {
    /// Numeric value passed to `input keyevent`.
    pub fn code(&self) -> u16 {
        match self {
            AndroidKeyCode::Other(n) => *n,
            named => TABLE
                .iter()
                .find(|(k, _, _)| k == named)
                .map(|(_, n, _)| *n)
                .unwrap_or_default(),
        }
    }

    /// Looks up a key by numeric value, falling back to [`AndroidKeyCode::Other`].
    pub fn from_code(code: u16) -> Self {
        TABLE
            .iter()
            .find(|(_, n, _)| *n == code)
            .map(|(k, _, _)| *k)
            .unwrap_or(AndroidKeyCode::Other(code))
    }

    fn short_name(&self) -> Option<&'static str> {
        TABLE.iter().find(|(k, _, _)| k == self).map(|(_, _, s)| *s)
    }
}

impl fmt::Display for AndroidKeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_name() {
            Some(name) => write!(f, "KEYCODE_{name}"),
            None => write!(f, "{}", self.code()),
        }
    }
}

impl FromStr for AndroidKeyCode {
    type Err = KeyCodeError;

    /// Accepts `BACK`, `back`, `KEYCODE_BACK` or a raw number such as `4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(KeyCodeError::Empty);
        }
        if let Ok(n) = trimmed.parse::<u16>() {
            return Ok(Self::from_code(n));
        }
        let upper = trimmed.to_ascii_uppercase();
        let name = upper.strip_prefix("KEYCODE_").unwrap_or(&upper);
        TABLE
            .iter()
            .find(|(_, _, s)| *s == name)
            .map(|(k, _, _)| *k)
            .ok_or_else(|| KeyCodeError::UnknownName(trimmed.to_string()))
    }
}

impl TryFrom<String> for AndroidKeyCode {
    type Error = KeyCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AndroidKeyCode> for String {
    fn from(k: AndroidKeyCode) -> Self {
        k.to_string()
    }
}
