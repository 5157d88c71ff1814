//! ScreenGeometryCache: lazy, per-device screen geometry resolution.
//!
//! The cache is the single owner of the `device → ScreenGeometry` map.  Every
//! other component reads through it; a miss triggers the strategy chain from
//! [`mirror_core::domain::geometry::STRATEGIES`].
//!
//! # Caching rules
//!
//! - Only valid geometries are stored.  A failed resolution returns
//!   [`ScreenGeometry::UNRESOLVED`] and the device is not queried again
//!   until the retry back-off has elapsed; calls inside the back-off return
//!   the sentinel immediately.
//! - Stored values are never replaced: a device's resolution is assumed
//!   stable for the session.
//! - Two concurrent misses for the same device may both query the device;
//!   both write the same valid value and the second insert is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use mirror_core::{DeviceEndpoint, GeometryQuery, ScreenGeometry, STRATEGIES};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::execute_command::DeviceBridge;

/// How long a device whose geometry could not be resolved is left alone.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

pub struct ScreenGeometryCache {
    bridge: Arc<dyn DeviceBridge>,
    query_timeout: Duration,
    retry_after: Duration,
    entries: RwLock<HashMap<DeviceEndpoint, ScreenGeometry>>,
    failures: RwLock<HashMap<DeviceEndpoint, Instant>>,
}

impl ScreenGeometryCache {
    pub fn new(bridge: Arc<dyn DeviceBridge>, query_timeout: Duration) -> Self {
        Self {
            bridge,
            query_timeout,
            retry_after: DEFAULT_RETRY_AFTER,
            entries: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides [`DEFAULT_RETRY_AFTER`].  Zero retries on every call.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Returns the cached geometry without querying the device.
    pub fn peek(&self, endpoint: &DeviceEndpoint) -> Option<ScreenGeometry> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(endpoint).copied()
    }

    /// Returns the geometry for `endpoint`, querying the device on a miss.
    ///
    /// Never fails: total failure yields [`ScreenGeometry::UNRESOLVED`], which
    /// callers must treat as "mapping unavailable".
    pub async fn resolve(&self, endpoint: &DeviceEndpoint) -> ScreenGeometry {
        if let Some(geometry) = self.peek(endpoint) {
            return geometry;
        }
        if self.backing_off(endpoint) {
            return ScreenGeometry::UNRESOLVED;
        }

        let geometry = self.query(endpoint).await;
        if geometry.is_valid() {
            let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.entry(endpoint.clone()).or_insert(geometry);
            self.failures.write().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(endpoint);
        } else {
            warn!(
                device = %endpoint,
                "screen geometry could not be resolved; coordinates for this device will not be scaled (retry in {:?})",
                self.retry_after
            );
            let mut failures = self.failures.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            failures.insert(endpoint.clone(), Instant::now());
        }
        geometry
    }

    /// `true` while a recent failed resolution is still inside the back-off.
    fn backing_off(&self, endpoint: &DeviceEndpoint) -> bool {
        let failures = self.failures.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        failures.get(endpoint).is_some_and(|failed_at| failed_at.elapsed() < self.retry_after)
    }

    /// Resolves every endpoint concurrently and logs each result.
    ///
    /// Results are returned in `endpoints` order.
    pub async fn warm(self: &Arc<Self>, endpoints: &[DeviceEndpoint]) -> Vec<(DeviceEndpoint, ScreenGeometry)> {
        let mut tasks = JoinSet::new();
        for (index, endpoint) in endpoints.iter().enumerate() {
            let cache = Arc::clone(self);
            let endpoint = endpoint.clone();
            tasks.spawn(async move {
                let geometry = cache.resolve(&endpoint).await;
                (index, geometry)
            });
        }

        let mut resolved = vec![ScreenGeometry::UNRESOLVED; endpoints.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, geometry)) => resolved[index] = geometry,
                Err(e) => warn!("geometry task failed: {e}"),
            }
        }

        endpoints
            .iter()
            .cloned()
            .zip(resolved)
            .inspect(|(endpoint, geometry)| {
                if geometry.is_valid() {
                    info!(device = %endpoint, "screen geometry {geometry}");
                }
            })
            .collect()
    }

    async fn query(&self, endpoint: &DeviceEndpoint) -> ScreenGeometry {
        let mut outputs: HashMap<GeometryQuery, Option<String>> = HashMap::new();
        for strategy in STRATEGIES {
            if !outputs.contains_key(&strategy.query) {
                let text = self.fetch(endpoint, strategy.query).await;
                outputs.insert(strategy.query, text);
            }
            let Some(Some(text)) = outputs.get(&strategy.query) else {
                continue;
            };
            if let Some(geometry) = (strategy.parse)(text) {
                debug!(device = %endpoint, strategy = strategy.name, "resolved {geometry}");
                return geometry;
            }
        }
        ScreenGeometry::UNRESOLVED
    }

    async fn fetch(&self, endpoint: &DeviceEndpoint, query: GeometryQuery) -> Option<String> {
        let command = query.command();
        match tokio::time::timeout(self.query_timeout, self.bridge.query_text(endpoint, command)).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                debug!(device = %endpoint, "`{command}` failed: {e}");
                None
            }
            Err(_) => {
                debug!(device = %endpoint, "`{command}` timed out after {:?}", self.query_timeout);
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
