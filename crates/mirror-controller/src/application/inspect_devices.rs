//! InspectDevicesUseCase: per-device identification for the `info` command.

use std::sync::Arc;
use std::time::Duration;

use mirror_core::{DeviceEndpoint, DeviceRole, DeviceSet, ScreenGeometry};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::debug;

use super::execute_command::DeviceBridge;
use super::resolve_geometry::ScreenGeometryCache;

/// System properties queried for each device, by field.
const PROPERTIES: [(&str, &str); 4] = [
    ("model", "ro.product.model"),
    ("brand", "ro.product.brand"),
    ("android_version", "ro.build.version.release"),
    ("serial", "ro.serialno"),
];

/// What a device reports about itself.  Properties it did not answer stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub endpoint: DeviceEndpoint,
    pub role: Option<DeviceRole>,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub android_version: Option<String>,
    pub serial: Option<String>,
    pub geometry: Option<ScreenGeometry>,
}

impl DeviceInfo {
    fn empty(endpoint: &DeviceEndpoint, role: Option<DeviceRole>) -> Self {
        Self {
            endpoint: endpoint.clone(),
            role,
            model: None,
            brand: None,
            android_version: None,
            serial: None,
            geometry: None,
        }
    }

    fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "model" => &mut self.model,
            "brand" => &mut self.brand,
            "android_version" => &mut self.android_version,
            _ => &mut self.serial,
        };
        *slot = Some(value);
    }

    /// `false` when the device answered nothing at all.
    pub fn is_reachable(&self) -> bool {
        self.model.is_some() || self.serial.is_some() || self.geometry.is_some()
    }
}

pub struct InspectDevicesUseCase {
    bridge: Arc<dyn DeviceBridge>,
    cache: Arc<ScreenGeometryCache>,
    query_timeout: Duration,
}

impl InspectDevicesUseCase {
    pub fn new(bridge: Arc<dyn DeviceBridge>, cache: Arc<ScreenGeometryCache>, query_timeout: Duration) -> Self {
        Self { bridge, cache, query_timeout }
    }

    /// Inspects every device of `devices` concurrently, master first.
    pub async fn inspect_all(&self, devices: &DeviceSet) -> Vec<DeviceInfo> {
        let mut tasks = JoinSet::new();
        for (index, target) in devices.iter().enumerate() {
            let endpoint = target.endpoint.clone();
            let role = target.role;
            let bridge = Arc::clone(&self.bridge);
            let cache = Arc::clone(&self.cache);
            let timeout = self.query_timeout;
            tasks.spawn(async move {
                let mut info = inspect(&*bridge, &cache, &endpoint, timeout).await;
                info.role = Some(role);
                (index, info)
            });
        }

        let mut infos: Vec<DeviceInfo> = devices
            .iter()
            .map(|t| DeviceInfo::empty(t.endpoint, Some(t.role)))
            .collect();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, info)) = joined {
                infos[index] = info;
            }
        }
        infos
    }
}

async fn inspect(
    bridge: &dyn DeviceBridge,
    cache: &ScreenGeometryCache,
    endpoint: &DeviceEndpoint,
    timeout: Duration,
) -> DeviceInfo {
    let mut info = DeviceInfo::empty(endpoint, None);
    for (field, property) in PROPERTIES {
        let command = format!("getprop {property}");
        match tokio::time::timeout(timeout, bridge.query_text(endpoint, &command)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => info.set(field, text.trim().to_string()),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(device = %endpoint, "`{command}` failed: {e}"),
            Err(_) => debug!(device = %endpoint, "`{command}` timed out"),
        }
    }
    let geometry = cache.resolve(endpoint).await;
    info.geometry = geometry.is_valid().then_some(geometry);
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::device_bridge::mock::MockDeviceBridge;

    #[tokio::test]
    async fn test_inspect_reports_properties_and_geometry_per_device() {
        // Arrange
        let bridge = Arc::new(
            MockDeviceBridge::new()
                .with_device("m", 1080, 2400)
                .with_prop("m", "ro.product.model", "SM-G991B")
                .with_prop("m", "ro.product.brand", "samsung")
                .with_prop("m", "ro.build.version.release", "14")
                .with_device("s", 720, 1600)
                .with_prop("s", "ro.serialno", "R58N"),
        );
        let cache = Arc::new(ScreenGeometryCache::new(bridge.clone(), Duration::from_secs(1)));
        let devices = DeviceSet::new(DeviceEndpoint::new("m"), vec![DeviceEndpoint::new("s")]).unwrap();
        let uc = InspectDevicesUseCase::new(bridge, cache, Duration::from_secs(1));

        // Act
        let infos = uc.inspect_all(&devices).await;

        // Assert
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].role, Some(DeviceRole::Master));
        assert_eq!(infos[0].model.as_deref(), Some("SM-G991B"));
        assert_eq!(infos[0].android_version.as_deref(), Some("14"));
        assert_eq!(infos[0].serial, None);
        assert_eq!(infos[0].geometry.map(|g| (g.width, g.height)), Some((1080, 2400)));
        assert_eq!(infos[1].serial.as_deref(), Some("R58N"));
        assert_eq!(infos[1].model, None);
    }

    #[tokio::test]
    async fn test_unreachable_device_is_reported_empty() {
        let bridge = Arc::new(MockDeviceBridge::new().with_device("m", 1080, 2400).unreachable("m"));
        let cache = Arc::new(ScreenGeometryCache::new(bridge.clone(), Duration::from_secs(1)));
        let devices = DeviceSet::new(DeviceEndpoint::new("m"), vec![]).unwrap();
        let uc = InspectDevicesUseCase::new(bridge, cache, Duration::from_secs(1));

        let infos = uc.inspect_all(&devices).await;

        assert!(!infos[0].is_reachable());
        assert_eq!(infos[0].geometry, None);
    }
}
