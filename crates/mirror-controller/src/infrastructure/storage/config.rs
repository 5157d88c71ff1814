//! TOML-based configuration persistence for the controller.
//!
//! Reads and writes `AppConfig` to an explicit path or to the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\FanoutMirror\config.toml`
//! - Linux:    `~/.config/fanout-mirror/config.toml`
//! - macOS:    `~/Library/Application Support/FanoutMirror/config.toml`
//!
//! Example:
//!
//! ```toml
//! [session]
//! master = "192.168.1.20:5555"
//! slaves = ["192.168.1.21:5555", "R58N123ABC"]
//! window_title = "Phone Master - Control Here"
//!
//! [timing]
//! interactive_timeout_ms = 5000
//!
//! [mapping]
//! slave_mode = "letterbox"
//!
//! [surface]
//! x = 300
//! y = 50
//! width = 540
//! height = 1200
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, and every section is
//! optional, so an empty file or a file missing newer fields still loads.
//! A missing file is not an error: defaults are used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror_core::{DeviceEndpoint, DeviceSet, DeviceSetError, MappingMode, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::execute_command::Timeouts;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No master device was configured.
    #[error("no master device configured (use --master or [session] master)")]
    NoMaster,

    /// The configured device roles are inconsistent.
    #[error("invalid device set: {0}")]
    Devices(#[from] DeviceSetError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Fixed client-area position of the mirroring window, in screen pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<SurfaceConfig>,
}

/// Devices and operator-facing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Bridge identifier of the master device (serial or `host:port`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default)]
    pub slaves: Vec<String>,
    /// Title given to (and searched for on) the mirroring window.
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Deadlines and durations, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_interactive_timeout_ms")]
    pub interactive_timeout_ms: u64,
    #[serde(default = "default_bulk_timeout_ms")]
    pub bulk_timeout_ms: u64,
    /// Deadline for probe, geometry and device-info queries.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_swipe_duration_ms")]
    pub swipe_duration_ms: u32,
    #[serde(default = "default_join_window_ms")]
    pub join_window_ms: u64,
    /// Time the display process must survive to count as started.
    #[serde(default = "default_display_startup_ms")]
    pub display_startup_ms: u64,
    /// How long to wait for the mirroring window to appear.
    #[serde(default = "default_surface_wait_ms")]
    pub surface_wait_ms: u64,
    /// Back-off before re-querying a device whose geometry failed to resolve.
    #[serde(default = "default_geometry_retry_ms")]
    pub geometry_retry_ms: u64,
}

/// Pointer interpretation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GestureConfig {
    /// Movement (device pixels, either axis) above which a press/release is a drag.
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold: u32,
    /// Half-length of the swipe produced by one wheel notch, in device pixels.
    #[serde(default = "default_scroll_distance")]
    pub scroll_distance: u32,
    #[serde(default = "default_true")]
    pub right_click_back: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingConfig {
    /// `letterbox` (uniform scale, bars rejected) or `stretch`.
    #[serde(default)]
    pub slave_mode: MappingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Launch the mirroring display for `run`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scrcpy_path")]
    pub scrcpy_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Window decoration height above the client area.
    #[serde(default)]
    pub title_bar: u32,
}

impl SurfaceConfig {
    pub fn client_area(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_window_title() -> String {
    "Phone Master - Control Here".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_interactive_timeout_ms() -> u64 {
    5_000
}
fn default_bulk_timeout_ms() -> u64 {
    120_000
}
fn default_query_timeout_ms() -> u64 {
    5_000
}
fn default_swipe_duration_ms() -> u32 {
    mirror_core::domain::gesture::DEFAULT_SWIPE_DURATION_MS
}
fn default_join_window_ms() -> u64 {
    2_000
}
fn default_display_startup_ms() -> u64 {
    2_000
}
fn default_surface_wait_ms() -> u64 {
    10_000
}
fn default_geometry_retry_ms() -> u64 {
    30_000
}
fn default_drag_threshold() -> u32 {
    mirror_core::domain::gesture::DEFAULT_DRAG_THRESHOLD
}
fn default_scroll_distance() -> u32 {
    300
}
fn default_true() -> bool {
    true
}
fn default_adb_path() -> PathBuf {
    PathBuf::from("adb")
}
fn default_scrcpy_path() -> PathBuf {
    PathBuf::from("scrcpy")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            master: None,
            slaves: Vec::new(),
            window_title: default_window_title(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interactive_timeout_ms: default_interactive_timeout_ms(),
            bulk_timeout_ms: default_bulk_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            swipe_duration_ms: default_swipe_duration_ms(),
            join_window_ms: default_join_window_ms(),
            display_startup_ms: default_display_startup_ms(),
            surface_wait_ms: default_surface_wait_ms(),
            geometry_retry_ms: default_geometry_retry_ms(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: default_drag_threshold(),
            scroll_distance: default_scroll_distance(),
            right_click_back: default_true(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { adb_path: default_adb_path() }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { enabled: default_true(), scrcpy_path: default_scrcpy_path() }
    }
}

// ── Derived runtime values ────────────────────────────────────────────────────

impl TimingConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            interactive: Duration::from_millis(self.interactive_timeout_ms),
            bulk: Duration::from_millis(self.bulk_timeout_ms),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn join_window(&self) -> Duration {
        Duration::from_millis(self.join_window_ms)
    }

    pub fn display_startup(&self) -> Duration {
        Duration::from_millis(self.display_startup_ms)
    }

    pub fn surface_wait(&self) -> Duration {
        Duration::from_millis(self.surface_wait_ms)
    }

    pub fn geometry_retry(&self) -> Duration {
        Duration::from_millis(self.geometry_retry_ms)
    }
}

impl SessionConfig {
    /// Builds the validated device set from the configured identifiers.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoMaster`] when no master is set, or
    /// [`ConfigError::Devices`] when the roles are inconsistent.
    pub fn device_set(&self) -> Result<DeviceSet, ConfigError> {
        let master = self.master.as_deref().ok_or(ConfigError::NoMaster)?;
        let slaves = self.slaves.iter().map(|s| DeviceEndpoint::new(s.as_str())).collect();
        Ok(DeviceSet::new(DeviceEndpoint::new(master), slaves)?)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

/// Persists `config` to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("FanoutMirror"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("fanout-mirror"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("FanoutMirror"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
