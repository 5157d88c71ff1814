//! Mirroring display process.
//!
//! The display shows the master's screen in a host window; the controller
//! never parses its video, it only starts, polls, and terminates the child.
//!
//! # scrcpy launch (for beginners)
//!
//! scrcpy is started with `--no-control` so that it does not forward its own
//! input to the master: the controller sends every action itself.  Some
//! scrcpy builds refuse that flag combination and exit immediately, so a
//! startup grace period is observed.  If the process is gone by then, it is
//! relaunched with control enabled (and `--turn-screen-off`, which is only
//! allowed in that mode) and a warning is logged.  If that also exits, the
//! session cannot start.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::DeviceEndpoint;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub mod mock;

/// Default time a fresh display process must survive to count as started.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Observable state of a display process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    NotStarted,
    Running,
    Exited(Option<i32>),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisplayError {
    #[error("`{program}` was not found")]
    NotInstalled { program: String },

    #[error("display process exited during startup: {stderr}")]
    StartupFailed { stderr: String },

    #[error("display process could not be spawned: {0}")]
    Spawn(String),
}

impl DisplayError {
    /// What the operator should do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            DisplayError::NotInstalled { .. } => {
                "install scrcpy (https://github.com/Genymobile/scrcpy/releases, or `winget install scrcpy`) or set [display] scrcpy_path"
            }
            DisplayError::StartupFailed { .. } => "make sure the master device is connected: adb devices",
            DisplayError::Spawn(_) => "check that the display program is executable",
        }
    }
}

/// Lifecycle of the mirroring display child process.
#[async_trait]
pub trait DisplayProcess: Send {
    /// Starts the display; returns once it has survived the startup grace period.
    async fn start(&mut self) -> Result<(), DisplayError>;

    fn poll(&mut self) -> DisplayStatus;

    /// Stops the display.  Harmless when it is not running.
    async fn terminate(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaunchMode {
    NoControl,
    WithControl,
}

enum Launch {
    Running(Child),
    Exited(String),
}

/// Settings for [`ScrcpyDisplay`].
#[derive(Debug, Clone)]
pub struct ScrcpyOptions {
    pub program: PathBuf,
    pub device: DeviceEndpoint,
    pub window_title: String,
    pub startup_grace: Duration,
}

/// [`DisplayProcess`] backed by scrcpy.
pub struct ScrcpyDisplay {
    options: ScrcpyOptions,
    child: Option<Child>,
}

impl ScrcpyDisplay {
    pub fn new(options: ScrcpyOptions) -> Self {
        Self { options, child: None }
    }

    fn args(&self, mode: LaunchMode) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            self.options.device.to_string(),
            "--window-title".to_string(),
            self.options.window_title.clone(),
            "--stay-awake".to_string(),
        ];
        match mode {
            LaunchMode::NoControl => args.push("--no-control".to_string()),
            LaunchMode::WithControl => args.push("--turn-screen-off".to_string()),
        }
        args.push("--disable-screensaver".to_string());
        args
    }

    async fn launch(&self, mode: LaunchMode) -> Result<Launch, DisplayError> {
        let program = &self.options.program;
        let mut child = Command::new(program)
            .args(self.args(mode))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DisplayError::NotInstalled { program: program.display().to_string() },
                _ => DisplayError::Spawn(e.to_string()),
            })?;

        tokio::time::sleep(self.options.startup_grace).await;

        match child.try_wait() {
            Ok(None) => {
                drain_stderr(&mut child);
                Ok(Launch::Running(child))
            }
            Ok(Some(_)) => {
                let output = child.wait_with_output().await.map_err(|e| DisplayError::Spawn(e.to_string()))?;
                Ok(Launch::Exited(String::from_utf8_lossy(&output.stderr).trim().to_string()))
            }
            Err(e) => Err(DisplayError::Spawn(e.to_string())),
        }
    }
}

/// Forwards the child's stderr to the log so the pipe never fills up.
fn drain_stderr(child: &mut Child) {
    let Some(stderr) = child.stderr.take() else {
        return;
    };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "scrcpy", "{line}");
        }
    });
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return "no error output".to_string();
    }
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl DisplayProcess for ScrcpyDisplay {
    async fn start(&mut self) -> Result<(), DisplayError> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = match self.launch(LaunchMode::NoControl).await? {
            Launch::Running(child) => child,
            Launch::Exited(stderr) => {
                warn!("scrcpy with --no-control exited during startup ({}); retrying with control enabled", excerpt(&stderr, 200));
                match self.launch(LaunchMode::WithControl).await? {
                    Launch::Running(child) => {
                        warn!("scrcpy started without --no-control; clicks on the window may also reach the master directly");
                        child
                    }
                    Launch::Exited(stderr) => {
                        return Err(DisplayError::StartupFailed { stderr: excerpt(&stderr, 300) });
                    }
                }
            }
        };

        info!(device = %self.options.device, title = %self.options.window_title, "screen mirroring started");
        self.child = Some(child);
        Ok(())
    }

    fn poll(&mut self) -> DisplayStatus {
        let Some(child) = self.child.as_mut() else {
            return DisplayStatus::NotStarted;
        };
        match child.try_wait() {
            Ok(None) => DisplayStatus::Running,
            Ok(Some(status)) => DisplayStatus::Exited(status.code()),
            Err(_) => DisplayStatus::Exited(None),
        }
    }

    async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("display process already gone: {e}");
            }
            info!("screen mirroring stopped");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
