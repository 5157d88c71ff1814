//! Input primitives and the bridge commands they are rendered to.
//!
//! Every primitive maps to exactly one [`BridgeCommand`]:
//!
//! | Primitive        | Command                                  |
//! |------------------|------------------------------------------|
//! | `Tap`            | `input tap X Y`                          |
//! | `Swipe`          | `input swipe X1 Y1 X2 Y2 MS`             |
//! | `KeyEvent`       | `input keyevent CODE`                    |
//! | `Text`           | `input text "ESCAPED"`                   |
//! | `LaunchActivity` | `am start -n PKG/ACTIVITY`               |
//! | `Install`        | bridge-level install of a local APK      |
//! | `Screenshot`     | `screencap -p` on the device, then pull  |

pub mod escape;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::device::DeviceEndpoint;
use crate::domain::mapping::Point;
use crate::keymap::AndroidKeyCode;

pub use escape::escape_text;

/// Where `screencap` writes on the device before the file is pulled.
pub const SCREENSHOT_DEVICE_PATH: &str = "/sdcard/screenshot.png";

/// Timeout category a primitive is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutClass {
    /// Short operations the operator waits on (default 5 s).
    Interactive,
    /// Long operations such as installs (default 120 s).
    Bulk,
}

/// A single-device input or management primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPrimitive {
    Tap { at: Point },
    Swipe { start: Point, end: Point, duration_ms: u32 },
    KeyEvent { code: AndroidKeyCode },
    Text { value: String },
    LaunchActivity { package: String, activity: String },
    Install { apk: PathBuf },
    /// Capture the screen and copy it to `local` on the host.
    Screenshot { local: PathBuf },
}

/// What the device bridge is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// A command line run by the device shell.
    Shell(String),
    /// Install a local APK on the device.
    Install(PathBuf),
    /// Capture the screen to `remote`, then pull it to `local`.
    Screenshot { remote: String, local: PathBuf },
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeCommand::Shell(cmd) => f.write_str(cmd),
            BridgeCommand::Install(path) => write!(f, "install {}", path.display()),
            BridgeCommand::Screenshot { remote, local } => {
                write!(f, "screencap -p {remote}; pull {remote} {}", local.display())
            }
        }
    }
}

impl InputPrimitive {
    /// A screenshot of `endpoint` saved as `screenshot_<id>.png` under `dir`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` in the identifier become `_`, so
    /// network endpoints such as `192.168.1.5:5555` give valid file names.
    pub fn screenshot_into(dir: &Path, endpoint: &DeviceEndpoint) -> Self {
        let id: String = endpoint
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        InputPrimitive::Screenshot { local: dir.join(format!("screenshot_{id}.png")) }
    }

    /// Renders the primitive to its bridge command.
    pub fn command(&self) -> BridgeCommand {
        let shell = match self {
            InputPrimitive::Tap { at } => format!("input tap {} {}", at.x, at.y),
            InputPrimitive::Swipe { start, end, duration_ms } => format!(
                "input swipe {} {} {} {} {}",
                start.x, start.y, end.x, end.y, duration_ms
            ),
            InputPrimitive::KeyEvent { code } => format!("input keyevent {}", code.code()),
            InputPrimitive::Text { value } => format!("input text \"{}\"", escape_text(value)),
            InputPrimitive::LaunchActivity { package, activity } => {
                format!("am start -n {package}/{activity}")
            }
            InputPrimitive::Install { apk } => return BridgeCommand::Install(apk.clone()),
            InputPrimitive::Screenshot { local } => {
                return BridgeCommand::Screenshot { remote: SCREENSHOT_DEVICE_PATH.to_string(), local: local.clone() }
            }
        };
        BridgeCommand::Shell(shell)
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            InputPrimitive::Install { .. } | InputPrimitive::Screenshot { .. } => TimeoutClass::Bulk,
            _ => TimeoutClass::Interactive,
        }
    }

    /// Decides success from the bridge outcome.
    ///
    /// Shell primitives succeed on exit status 0.  `adb install` can exit 0
    /// after a failed install, so an install also requires `Success` in stdout.
    pub fn is_success(&self, status: i32, stdout: &str) -> bool {
        match self {
            InputPrimitive::Install { .. } => status == 0 && stdout.contains("Success"),
            _ => status == 0,
        }
    }

    /// Short lowercase name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            InputPrimitive::Tap { .. } => "tap",
            InputPrimitive::Swipe { .. } => "swipe",
            InputPrimitive::KeyEvent { .. } => "key",
            InputPrimitive::Text { .. } => "text",
            InputPrimitive::LaunchActivity { .. } => "launch",
            InputPrimitive::Install { .. } => "install",
            InputPrimitive::Screenshot { .. } => "screenshot",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(p: InputPrimitive) -> String {
        match p.command() {
            BridgeCommand::Shell(s) => s,
            other => panic!("expected shell command, got {other:?}"),
        }
    }

    #[test]
    fn test_tap_renders_input_tap() {
        assert_eq!(shell(InputPrimitive::Tap { at: Point::new(360, 800) }), "input tap 360 800");
    }

    #[test]
    fn test_swipe_renders_all_coordinates_and_duration() {
        let p = InputPrimitive::Swipe {
            start: Point::new(1, 2),
            end: Point::new(3, 4),
            duration_ms: 300,
        };
        assert_eq!(shell(p), "input swipe 1 2 3 4 300");
    }

    #[test]
    fn test_key_event_renders_numeric_code() {
        let p = InputPrimitive::KeyEvent { code: AndroidKeyCode::Back };
        assert_eq!(shell(p), "input keyevent 4");
    }

    #[test]
    fn test_text_is_escaped_and_quoted() {
        let p = InputPrimitive::Text { value: "a b&c".to_string() };
        assert_eq!(shell(p), r#"input text "a%sb\&c""#);
    }

    #[test]
    fn test_launch_activity_renders_am_start() {
        let p = InputPrimitive::LaunchActivity {
            package: "com.example".to_string(),
            activity: ".MainActivity".to_string(),
        };
        assert_eq!(shell(p), "am start -n com.example/.MainActivity");
    }

    #[test]
    fn test_install_is_bulk_and_needs_success_marker() {
        let p = InputPrimitive::Install { apk: PathBuf::from("app.apk") };
        assert_eq!(p.timeout_class(), TimeoutClass::Bulk);
        assert_eq!(p.command(), BridgeCommand::Install(PathBuf::from("app.apk")));
        assert!(p.is_success(0, "Performing Streamed Install\nSuccess\n"));
        assert!(!p.is_success(0, "Failure [INSTALL_FAILED_ALREADY_EXISTS]"));
    }

    #[test]
    fn test_screenshot_captures_to_device_path_then_pulls() {
        let p = InputPrimitive::Screenshot { local: PathBuf::from("out/a.png") };
        assert_eq!(p.timeout_class(), TimeoutClass::Bulk);
        let remote = "/sdcard/screenshot.png".to_string();
        assert_eq!(p.command(), BridgeCommand::Screenshot { remote, local: PathBuf::from("out/a.png") });
        assert_eq!(
            p.command().to_string(),
            "screencap -p /sdcard/screenshot.png; pull /sdcard/screenshot.png out/a.png"
        );
    }

    #[test]
    fn test_screenshot_file_name_is_derived_from_device_id() {
        let usb = InputPrimitive::screenshot_into(Path::new("shots"), &DeviceEndpoint::new("R58M123"));
        let tcp = InputPrimitive::screenshot_into(Path::new("shots"), &DeviceEndpoint::new("192.168.1.5:5555"));

        let dir = Path::new("shots");
        assert_eq!(usb, InputPrimitive::Screenshot { local: dir.join("screenshot_R58M123.png") });
        assert_eq!(tcp, InputPrimitive::Screenshot { local: dir.join("screenshot_192.168.1.5_5555.png") });
    }

    #[test]
    fn test_shell_primitive_success_depends_on_status_only() {
        let p = InputPrimitive::Tap { at: Point::new(0, 0) };
        assert_eq!(p.timeout_class(), TimeoutClass::Interactive);
        assert!(p.is_success(0, ""));
        assert!(!p.is_success(1, "Success"));
    }
}
