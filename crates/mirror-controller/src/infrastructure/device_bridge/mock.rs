//! In-memory device bridge for tests and dry runs.
//!
//! Each simulated device answers `wm size` with its configured screen size
//! and `getprop` with configured properties.  Devices can be told to reject
//! commands, hang forever, or be unreachable.  Every successfully accepted
//! command is recorded so tests can assert exactly what each device received.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mirror_core::{BridgeCommand, DeviceEndpoint};

use crate::application::execute_command::{BridgeError, CommandOutput, DeviceBridge};

#[derive(Debug, Default)]
struct State {
    sizes: HashMap<DeviceEndpoint, (u32, u32)>,
    props: HashMap<(DeviceEndpoint, String), String>,
    rejecting: HashSet<DeviceEndpoint>,
    hanging: HashSet<DeviceEndpoint>,
    unreachable: HashSet<DeviceEndpoint>,
    sent: Vec<(DeviceEndpoint, String)>,
}

/// A recording [`DeviceBridge`]; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockDeviceBridge {
    state: Arc<Mutex<State>>,
}

impl MockDeviceBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reachable device with the given screen size.
    pub fn with_device(self, id: &str, width: u32, height: u32) -> Self {
        self.lock().sizes.insert(DeviceEndpoint::new(id), (width, height));
        self
    }

    /// Sets a system property reported by `getprop <name>`.
    pub fn with_prop(self, id: &str, name: &str, value: &str) -> Self {
        self.lock().props.insert((DeviceEndpoint::new(id), name.to_string()), value.to_string());
        self
    }

    /// Makes every command on `id` exit with status 1.
    pub fn rejecting(self, id: &str) -> Self {
        self.lock().rejecting.insert(DeviceEndpoint::new(id));
        self
    }

    /// Makes every command on `id` hang until cancelled.
    pub fn hanging(self, id: &str) -> Self {
        self.lock().hanging.insert(DeviceEndpoint::new(id));
        self
    }

    /// Makes `id` unreachable: every call fails at the transport level.
    pub fn unreachable(self, id: &str) -> Self {
        self.lock().unreachable.insert(DeviceEndpoint::new(id));
        self
    }

    /// All accepted commands, in arrival order.
    pub fn sent(&self) -> Vec<(DeviceEndpoint, String)> {
        self.lock().sent.clone()
    }

    /// Commands accepted by one device, in arrival order.
    pub fn sent_to(&self, id: &str) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(endpoint, _)| endpoint.as_str() == id)
            .map(|(_, command)| command.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared reachability checks; `true` means the call must hang.
    fn admit(&self, endpoint: &DeviceEndpoint) -> Result<bool, BridgeError> {
        let state = self.lock();
        if state.unreachable.contains(endpoint) || !state.sizes.contains_key(endpoint) {
            return Err(BridgeError::Io(format!("device '{endpoint}' not found")));
        }
        Ok(state.hanging.contains(endpoint))
    }
}

#[async_trait]
impl DeviceBridge for MockDeviceBridge {
    async fn send(&self, endpoint: &DeviceEndpoint, command: &BridgeCommand) -> Result<CommandOutput, BridgeError> {
        if self.admit(endpoint)? {
            std::future::pending::<()>().await;
        }
        let mut state = self.lock();
        if state.rejecting.contains(endpoint) {
            return Ok(CommandOutput { status: 1, stdout: String::new(), stderr: "error: rejected".to_string() });
        }
        state.sent.push((endpoint.clone(), command.to_string()));
        let stdout = match command {
            BridgeCommand::Install(_) => "Performing Streamed Install\nSuccess\n".to_string(),
            BridgeCommand::Screenshot { remote, .. } => format!("{remote}: 1 file pulled\n"),
            BridgeCommand::Shell(_) => String::new(),
        };
        Ok(CommandOutput { status: 0, stdout, stderr: String::new() })
    }

    async fn query_text(&self, endpoint: &DeviceEndpoint, command: &str) -> Result<String, BridgeError> {
        if self.admit(endpoint)? {
            std::future::pending::<()>().await;
        }
        let state = self.lock();
        if command == "wm size" {
            let (width, height) = state.sizes.get(endpoint).copied().unwrap_or_default();
            return Ok(format!("Physical size: {width}x{height}\n"));
        }
        if let Some(name) = command.strip_prefix("getprop ") {
            let value = state.props.get(&(endpoint.clone(), name.to_string())).cloned().unwrap_or_default();
            return Ok(format!("{value}\n"));
        }
        if let Some(rest) = command.strip_prefix("echo ") {
            return Ok(format!("{rest}\n"));
        }
        Err(BridgeError::Io(format!("unsupported query `{command}`")))
    }
}
