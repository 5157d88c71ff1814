//! `adb`-backed device bridge.
//!
//! Every call spawns `adb -s <id> …` as a child process:
//!
//! | Command                      | Invocation                    |
//! |------------------------------|-------------------------------|
//! | `BridgeCommand::Shell(cmd)`  | `adb -s <id> shell <cmd>`     |
//! | `BridgeCommand::Install(p)`  | `adb -s <id> install <p>`     |
//! | `BridgeCommand::Screenshot`  | `adb -s <id> shell screencap -p <remote>`, then `adb -s <id> pull <remote> <local>` |
//! | `query_text(cmd)`            | `adb -s <id> shell <cmd>`     |
//!
//! Children are spawned with `kill_on_drop`, so when the executor's timeout
//! drops the future the process is killed instead of leaking.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use mirror_core::{BridgeCommand, DeviceEndpoint};
use tokio::process::Command;
use tracing::trace;

use crate::application::execute_command::{BridgeError, CommandOutput, DeviceBridge};

/// Runs commands through the `adb` executable at `adb_path`.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb_path: PathBuf,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self { adb_path: adb_path.into() }
    }

    pub fn adb_path(&self) -> &Path {
        &self.adb_path
    }

    async fn run(&self, endpoint: &DeviceEndpoint, args: &[&OsStr]) -> Result<CommandOutput, BridgeError> {
        trace!(device = %endpoint, "adb {:?}", args);
        let output = Command::new(&self.adb_path)
            .arg("-s")
            .arg(endpoint.as_str())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BridgeError::Unavailable(format!(
                    "`{}` not found; install Android platform-tools or set [bridge] adb_path",
                    self.adb_path.display()
                )),
                _ => BridgeError::Io(e.to_string()),
            })?;

        Ok(CommandOutput {
            // A signal-terminated child has no exit code.
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn send(&self, endpoint: &DeviceEndpoint, command: &BridgeCommand) -> Result<CommandOutput, BridgeError> {
        match command {
            BridgeCommand::Shell(line) => self.run(endpoint, &[OsStr::new("shell"), OsStr::new(line)]).await,
            BridgeCommand::Install(apk) => self.run(endpoint, &[OsStr::new("install"), apk.as_os_str()]).await,
            BridgeCommand::Screenshot { remote, local } => {
                let screencap = [OsStr::new("shell"), OsStr::new("screencap"), OsStr::new("-p"), OsStr::new(remote)];
                let capture = self.run(endpoint, &screencap).await?;
                if capture.status != 0 {
                    return Ok(capture);
                }
                self.run(endpoint, &[OsStr::new("pull"), OsStr::new(remote), local.as_os_str()]).await
            }
        }
    }

    async fn query_text(&self, endpoint: &DeviceEndpoint, command: &str) -> Result<String, BridgeError> {
        let output = self.run(endpoint, &[OsStr::new("shell"), OsStr::new(command)]).await?;
        if output.status == 0 {
            Ok(output.stdout)
        } else {
            Err(BridgeError::Io(format!("`{command}` exited with status {}: {}", output.status, output.stderr)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_adb_is_reported_as_unavailable() {
        // Arrange
        let bridge = AdbBridge::new("/nonexistent/path/to/adb-for-tests");

        // Act
        let result = bridge.send(&DeviceEndpoint::new("x"), &BridgeCommand::Shell("input tap 1 2".into())).await;

        // Assert
        assert!(matches!(result, Err(BridgeError::Unavailable(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn test_screenshot_with_missing_adb_is_reported_as_unavailable() {
        let bridge = AdbBridge::new("/nonexistent/path/to/adb-for-tests");
        let command = BridgeCommand::Screenshot { remote: "/sdcard/s.png".to_string(), local: PathBuf::from("s.png") };

        let result = bridge.send(&DeviceEndpoint::new("x"), &command).await;

        assert!(matches!(result, Err(BridgeError::Unavailable(_))), "got {result:?}");
    }

    #[test]
    fn test_default_bridge_uses_adb_on_path() {
        assert_eq!(AdbBridge::default().adb_path(), Path::new("adb"));
    }
}
