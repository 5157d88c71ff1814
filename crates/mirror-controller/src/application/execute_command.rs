//! CommandExecutor: runs one primitive on one device with a bounded timeout.
//!
//! The executor is the only place that talks to the [`DeviceBridge`].  It
//! normalises every outcome into a [`CommandResult`]: a timeout or a broken
//! bridge becomes `success = false` with a distinguished [`CommandError`],
//! never a panic and never an error propagated to sibling devices.
//!
//! # Timeouts (for beginners)
//!
//! The bridge itself is not given a deadline.  The executor wraps every call
//! in [`tokio::time::timeout`]; when the deadline passes the bridge future is
//! dropped, which for the `adb` implementation kills the child process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::{BridgeCommand, DeviceEndpoint, InputPrimitive, TimeoutClass};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::stop_signal::StopSignal;

/// Default deadline for interactive primitives (tap, swipe, key, text).
pub const DEFAULT_INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for bulk primitives (install).
pub const DEFAULT_BULK_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw outcome reported by the device bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Failure of the bridge itself (as opposed to the device rejecting a command).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("device bridge could not be started: {0}")]
    Unavailable(String),
    #[error("device bridge I/O failed: {0}")]
    Io(String),
}

/// Capability to run commands on a device.
///
/// Infrastructure implements this over `adb`; tests use recording doubles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Runs `command` on `endpoint` and returns its exit status and output.
    async fn send(
        &self,
        endpoint: &DeviceEndpoint,
        command: &BridgeCommand,
    ) -> Result<CommandOutput, BridgeError>;

    /// Runs a shell query and returns its stdout (geometry, device info).
    async fn query_text(&self, endpoint: &DeviceEndpoint, command: &str) -> Result<String, BridgeError>;
}

/// Why a command did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    #[error("command timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("bridge transport failure: {message}")]
    Transport { message: String },

    #[error("device rejected command (status {status}): {stderr}")]
    Rejected { status: i32, stderr: String },

    #[error("cancelled by stop request")]
    Cancelled,
}

/// Normalised outcome of one primitive on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub endpoint: DeviceEndpoint,
    pub success: bool,
    /// Trimmed stdout of the command (empty when it never ran).
    pub output: String,
    pub error: Option<CommandError>,
}

impl CommandResult {
    fn failed(endpoint: &DeviceEndpoint, error: CommandError) -> Self {
        Self { endpoint: endpoint.clone(), success: false, output: String::new(), error: Some(error) }
    }

    /// A result for a device whose command never got to run.
    pub fn cancelled(endpoint: &DeviceEndpoint) -> Self {
        Self::failed(endpoint, CommandError::Cancelled)
    }
}

/// Deadlines per [`TimeoutClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub interactive: Duration,
    pub bulk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { interactive: DEFAULT_INTERACTIVE_TIMEOUT, bulk: DEFAULT_BULK_TIMEOUT }
    }
}

impl Timeouts {
    pub fn for_class(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Interactive => self.interactive,
            TimeoutClass::Bulk => self.bulk,
        }
    }
}

/// Executes primitives through a [`DeviceBridge`].
#[derive(Clone)]
pub struct CommandExecutor {
    bridge: Arc<dyn DeviceBridge>,
    timeouts: Timeouts,
}

impl CommandExecutor {
    pub fn new(bridge: Arc<dyn DeviceBridge>, timeouts: Timeouts) -> Self {
        Self { bridge, timeouts }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Runs `primitive` on `endpoint`.  Never fails; see [`CommandResult`].
    pub async fn execute(&self, endpoint: &DeviceEndpoint, primitive: &InputPrimitive) -> CommandResult {
        let limit = self.timeouts.for_class(primitive.timeout_class());
        let command = primitive.command();
        debug!(device = %endpoint, %command, "executing");

        let outcome = tokio::time::timeout(limit, self.bridge.send(endpoint, &command)).await;
        match outcome {
            Err(_) => {
                warn!(device = %endpoint, kind = primitive.kind(), "command timed out after {limit:?}");
                CommandResult::failed(endpoint, CommandError::Timeout { after: limit })
            }
            Ok(Err(e)) => {
                warn!(device = %endpoint, kind = primitive.kind(), "bridge failure: {e}");
                CommandResult::failed(endpoint, CommandError::Transport { message: e.to_string() })
            }
            Ok(Ok(out)) if primitive.is_success(out.status, &out.stdout) => CommandResult {
                endpoint: endpoint.clone(),
                success: true,
                output: out.stdout.trim().to_string(),
                error: None,
            },
            Ok(Ok(out)) => {
                let detail = if out.stderr.trim().is_empty() { out.stdout.trim() } else { out.stderr.trim() };
                warn!(device = %endpoint, status = out.status, "command rejected: {detail}");
                CommandResult {
                    endpoint: endpoint.clone(),
                    success: false,
                    output: out.stdout.trim().to_string(),
                    error: Some(CommandError::Rejected { status: out.status, stderr: detail.to_string() }),
                }
            }
        }
    }

    /// Runs the same primitive on every endpoint concurrently.
    ///
    /// One task per endpoint.  Results come back in `endpoints` order and there
    /// is exactly one per endpoint.  When `stop` fires, unfinished tasks are
    /// aborted and reported as [`CommandError::Cancelled`].
    pub async fn execute_all(
        &self,
        endpoints: &[DeviceEndpoint],
        primitive: &InputPrimitive,
        stop: &StopSignal,
    ) -> Vec<CommandResult> {
        let jobs: Vec<_> = endpoints.iter().map(|endpoint| (endpoint.clone(), primitive.clone())).collect();
        self.execute_each(&jobs, stop).await
    }

    /// Like [`execute_all`](Self::execute_all) with a primitive per endpoint.
    pub async fn execute_each(
        &self,
        jobs: &[(DeviceEndpoint, InputPrimitive)],
        stop: &StopSignal,
    ) -> Vec<CommandResult> {
        let mut slots: Vec<Option<CommandResult>> = jobs.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();
        for (index, (endpoint, primitive)) in jobs.iter().cloned().enumerate() {
            let executor = self.clone();
            tasks.spawn(async move { (index, executor.execute(&endpoint, &primitive).await) });
        }

        let mut stopped = false;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, result))) => slots[index] = Some(result),
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => warn!("bulk task ended abnormally: {e}"),
                },
                _ = stop.stopped(), if !stopped => {
                    warn!(pending = tasks.len(), "stop requested, cancelling bulk commands");
                    tasks.abort_all();
                    stopped = true;
                }
            }
        }

        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, (endpoint, _))| {
                slot.unwrap_or_else(|| {
                    if stopped {
                        CommandResult::cancelled(endpoint)
                    } else {
                        CommandResult::failed(
                            endpoint,
                            CommandError::Transport { message: "task ended without a result".to_string() },
                        )
                    }
                })
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stop_signal::stop_pair;
    use mirror_core::{AndroidKeyCode, Point};
    use std::path::PathBuf;

    fn ep(s: &str) -> DeviceEndpoint {
        DeviceEndpoint::new(s)
    }

    fn ok_output(stdout: &str) -> CommandOutput {
        CommandOutput { status: 0, stdout: stdout.to_string(), stderr: String::new() }
    }

    fn fast_timeouts() -> Timeouts {
        Timeouts { interactive: Duration::from_millis(50), bulk: Duration::from_millis(200) }
    }

    #[tokio::test]
    async fn test_execute_sends_rendered_shell_command() {
        // Arrange
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_send()
            .withf(|endpoint, command| {
                endpoint.as_str() == "dev1"
                    && matches!(command, BridgeCommand::Shell(s) if s == "input tap 10 20")
            })
            .times(1)
            .returning(|_, _| Ok(ok_output("")));
        let executor = CommandExecutor::new(Arc::new(bridge), Timeouts::default());

        // Act
        let result = executor.execute(&ep("dev1"), &InputPrimitive::Tap { at: Point::new(10, 20) }).await;

        // Assert
        assert!(result.success);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_execute_non_zero_status_is_rejected_with_stderr() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_send().returning(|_, _| {
            Ok(CommandOutput { status: 255, stdout: String::new(), stderr: "error: device offline\n".to_string() })
        });
        let executor = CommandExecutor::new(Arc::new(bridge), Timeouts::default());

        let result = executor.execute(&ep("d"), &InputPrimitive::KeyEvent { code: AndroidKeyCode::Home }).await;

        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(CommandError::Rejected { status: 255, stderr: "error: device offline".to_string() })
        );
    }

    #[tokio::test]
    async fn test_execute_bridge_error_is_transport_failure() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_send().returning(|_, _| Err(BridgeError::Unavailable("adb not found".to_string())));
        let executor = CommandExecutor::new(Arc::new(bridge), Timeouts::default());

        let result = executor.execute(&ep("d"), &InputPrimitive::Text { value: "x".to_string() }).await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(CommandError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_install_without_success_marker_fails() {
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_send()
            .returning(|_, _| Ok(ok_output("Failure [INSTALL_FAILED_INVALID_APK]")));
        let executor = CommandExecutor::new(Arc::new(bridge), Timeouts::default());

        let result = executor.execute(&ep("d"), &InputPrimitive::Install { apk: PathBuf::from("a.apk") }).await;

        assert!(!result.success);
        assert_eq!(result.output, "Failure [INSTALL_FAILED_INVALID_APK]");
    }

    #[tokio::test]
    async fn test_execute_times_out_with_distinguished_error() {
        // Arrange: a bridge that never answers within the deadline.
        struct HangingBridge;
        #[async_trait]
        impl DeviceBridge for HangingBridge {
            async fn send(&self, _: &DeviceEndpoint, _: &BridgeCommand) -> Result<CommandOutput, BridgeError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(CommandOutput::default())
            }
            async fn query_text(&self, _: &DeviceEndpoint, _: &str) -> Result<String, BridgeError> {
                Ok(String::new())
            }
        }
        let executor = CommandExecutor::new(Arc::new(HangingBridge), fast_timeouts());

        // Act
        let result = executor.execute(&ep("slow"), &InputPrimitive::Tap { at: Point::new(1, 1) }).await;

        // Assert
        assert_eq!(result.error, Some(CommandError::Timeout { after: Duration::from_millis(50) }));
    }

    #[tokio::test]
    async fn test_execute_all_returns_one_result_per_endpoint_in_order() {
        // Arrange
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_send().times(3).returning(|endpoint, _| {
            if endpoint.as_str() == "b" {
                Ok(CommandOutput { status: 1, stdout: String::new(), stderr: "nope".to_string() })
            } else {
                Ok(ok_output(""))
            }
        });
        let executor = CommandExecutor::new(Arc::new(bridge), Timeouts::default());
        let endpoints = [ep("a"), ep("b"), ep("c")];

        // Act
        let results = executor
            .execute_all(&endpoints, &InputPrimitive::KeyEvent { code: AndroidKeyCode::Back }, &StopSignal::never())
            .await;

        // Assert
        let summary: Vec<_> = results.iter().map(|r| (r.endpoint.as_str(), r.success)).collect();
        assert_eq!(summary, [("a", true), ("b", false), ("c", true)]);
    }

    #[tokio::test]
    async fn test_execute_all_stop_cancels_pending_tasks() {
        // Arrange
        struct SlowForB;
        #[async_trait]
        impl DeviceBridge for SlowForB {
            async fn send(&self, endpoint: &DeviceEndpoint, _: &BridgeCommand) -> Result<CommandOutput, BridgeError> {
                if endpoint.as_str() == "b" {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok(CommandOutput::default())
            }
            async fn query_text(&self, _: &DeviceEndpoint, _: &str) -> Result<String, BridgeError> {
                Ok(String::new())
            }
        }
        let timeouts = Timeouts { interactive: Duration::from_secs(30), bulk: Duration::from_secs(30) };
        let executor = CommandExecutor::new(Arc::new(SlowForB), timeouts);
        let (handle, signal) = stop_pair();
        let endpoints = [ep("a"), ep("b")];

        // Act
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        });
        let results = tokio::time::timeout(
            Duration::from_secs(2),
            executor.execute_all(&endpoints, &InputPrimitive::Tap { at: Point::new(0, 0) }, &signal),
        )
        .await
        .expect("execute_all must return promptly after stop");
        stopper.await.unwrap();

        // Assert
        assert!(results[0].success);
        assert_eq!(results[1].error, Some(CommandError::Cancelled));
    }

    #[test]
    fn test_timeouts_default_to_five_and_one_hundred_twenty_seconds() {
        let t = Timeouts::default();
        assert_eq!(t.for_class(TimeoutClass::Interactive), Duration::from_secs(5));
        assert_eq!(t.for_class(TimeoutClass::Bulk), Duration::from_secs(120));
    }
}
