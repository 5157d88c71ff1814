//! ActionDispatcher: fans one classified action out to every device.
//!
//! The master receives coordinates unmodified: it is the authoritative screen
//! the operator is looking at.  Every slave gets the point recomputed from the
//! master's geometry into its own geometry.  Key and text actions are sent
//! verbatim to all devices.
//!
//! # Partial failure (for beginners)
//!
//! Delivery is best-effort and independent per device.  Each device gets its
//! own task on a [`JoinSet`] that resolves geometry, maps the point and sends
//! the command, so a device that times out or cannot be mapped only produces
//! a failed [`DispatchResult`] for itself.  The caller inspects the [`DispatchReport`] to surface counts such
//! as "3 of 4 slaves succeeded".
//!
//! # Degraded coordinates
//!
//! When the master's or a slave's geometry is unresolved, the slave receives
//! the master coordinates unscaled.  That tap may land somewhere plausible but
//! wrong, so the result is flagged `degraded` and a warning is logged.

use std::sync::Arc;

use mirror_core::{
    domain::mapping::map_point_with, AndroidKeyCode, DeviceEndpoint, DeviceRole, DeviceSet, Gesture,
    InputPrimitive, MappingMode, Point, ScreenGeometry,
};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::execute_command::{CommandError, CommandExecutor};
use super::resolve_geometry::ScreenGeometryCache;

/// An action produced by the input loop (or the CLI) for all devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAction {
    Gesture(Gesture),
    Key(AndroidKeyCode),
    Text(String),
}

impl std::fmt::Display for MirrorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MirrorAction::Gesture(Gesture::Tap { at }) => write!(f, "tap {at}"),
            MirrorAction::Gesture(Gesture::Drag { start, end, duration_ms }) => {
                write!(f, "swipe {start} -> {end} ({duration_ms} ms)")
            }
            MirrorAction::Key(code) => write!(f, "key {code}"),
            MirrorAction::Text(value) => write!(f, "text {value:?}"),
        }
    }
}

/// Why delivery to one device did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    /// The point falls in a letterbox bar of this device; nothing was sent.
    #[error("point falls outside the visible area of this device")]
    MappingOutOfSurface,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Outcome for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub endpoint: DeviceEndpoint,
    pub role: DeviceRole,
    pub success: bool,
    /// Coordinates sent to this device (end point for swipes).
    pub mapped: Option<Point>,
    /// Coordinates were sent unscaled because a geometry was unresolved.
    pub degraded: bool,
    pub error: Option<DispatchError>,
}

/// Every device's outcome for one action, master first.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub id: Uuid,
    pub action: MirrorAction,
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn any_succeeded(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }

    pub fn master(&self) -> Option<&DispatchResult> {
        self.results.iter().find(|r| r.role == DeviceRole::Master)
    }

    /// e.g. `"3 of 4 slaves succeeded"`.
    pub fn slave_summary(&self) -> String {
        let slaves = self.results.iter().filter(|r| r.role == DeviceRole::Slave);
        let (ok, total) = slaves.fold((0, 0), |(ok, total), r| (ok + usize::from(r.success), total + 1));
        format!("{ok} of {total} slaves succeeded")
    }

    /// One line for the operator log.
    pub fn log_summary(&self) -> String {
        let master = match self.master() {
            Some(r) if r.success => "master ok",
            _ => "master FAILED",
        };
        let degraded = self.results.iter().filter(|r| r.degraded).count();
        if degraded > 0 {
            format!("{}: {master}, {} ({degraded} degraded)", self.action, self.slave_summary())
        } else {
            format!("{}: {master}, {}", self.action, self.slave_summary())
        }
    }
}

/// Per-device coordinate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Mapped(Point),
    Degraded(Point),
    OutOfSurface,
}

/// The action in master coordinates, before any device sees it.
#[derive(Debug, Clone)]
enum Shape {
    Tap(Point),
    Swipe { start: Point, end: Point, duration_ms: u32 },
    Verbatim(InputPrimitive),
}

/// What will be sent to one device.
struct Plan {
    endpoint: DeviceEndpoint,
    role: DeviceRole,
    primitive: Option<InputPrimitive>,
    mapped: Option<Point>,
    degraded: bool,
}

/// Everything one per-device task needs, owned so it can be spawned.
#[derive(Clone)]
struct Delivery {
    master: DeviceEndpoint,
    cache: Arc<ScreenGeometryCache>,
    executor: CommandExecutor,
    slave_mode: MappingMode,
}

pub struct ActionDispatcher {
    devices: DeviceSet,
    cache: Arc<ScreenGeometryCache>,
    executor: CommandExecutor,
    slave_mode: MappingMode,
    swipe_duration_ms: u32,
}

impl ActionDispatcher {
    pub fn new(
        devices: DeviceSet,
        cache: Arc<ScreenGeometryCache>,
        executor: CommandExecutor,
        slave_mode: MappingMode,
        swipe_duration_ms: u32,
    ) -> Self {
        Self { devices, cache, executor, slave_mode, swipe_duration_ms }
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Front door used by the input loop.
    pub async fn dispatch(&self, action: &MirrorAction) -> DispatchReport {
        match action {
            MirrorAction::Gesture(Gesture::Tap { at }) => self.dispatch_tap(*at).await,
            MirrorAction::Gesture(Gesture::Drag { start, end, duration_ms }) => {
                self.dispatch_drag(*start, *end, Some(*duration_ms)).await
            }
            MirrorAction::Key(code) => self.dispatch_key(*code).await,
            MirrorAction::Text(value) => self.dispatch_text(value).await,
        }
    }

    /// Taps the master at `p` and every slave at `p` remapped to its screen.
    pub async fn dispatch_tap(&self, p: Point) -> DispatchReport {
        self.run(MirrorAction::Gesture(Gesture::Tap { at: p }), Shape::Tap(p)).await
    }

    /// Swipes from `start` to `end` on every device, remapping both ends.
    ///
    /// `duration_ms` defaults to the configured swipe duration.
    pub async fn dispatch_drag(&self, start: Point, end: Point, duration_ms: Option<u32>) -> DispatchReport {
        let duration_ms = duration_ms.unwrap_or(self.swipe_duration_ms);
        let action = MirrorAction::Gesture(Gesture::Drag { start, end, duration_ms });
        self.run(action, Shape::Swipe { start, end, duration_ms }).await
    }

    /// Sends the key event verbatim to every device.
    pub async fn dispatch_key(&self, code: AndroidKeyCode) -> DispatchReport {
        self.run(MirrorAction::Key(code), Shape::Verbatim(InputPrimitive::KeyEvent { code })).await
    }

    /// Types `value` on every device.  Escaping happens in the primitive.
    pub async fn dispatch_text(&self, value: &str) -> DispatchReport {
        let primitive = InputPrimitive::Text { value: value.to_string() };
        self.run(MirrorAction::Text(value.to_string()), Shape::Verbatim(primitive)).await
    }

    /// One task per device; geometry lookups happen inside each task so a
    /// slow device only delays its own result.
    async fn run(&self, action: MirrorAction, shape: Shape) -> DispatchReport {
        let id = Uuid::new_v4();
        let targets: Vec<(DeviceRole, DeviceEndpoint)> =
            self.devices.iter().map(|t| (t.role, t.endpoint.clone())).collect();
        let mut results: Vec<Option<DispatchResult>> = vec![None; targets.len()];
        let mut tasks = JoinSet::new();

        for (index, (role, endpoint)) in targets.iter().cloned().enumerate() {
            let delivery = Delivery {
                master: self.devices.master().clone(),
                cache: Arc::clone(&self.cache),
                executor: self.executor.clone(),
                slave_mode: self.slave_mode,
            };
            let shape = shape.clone();
            let action = action.clone();
            tasks.spawn(async move { (index, delivery.deliver(&action, role, endpoint, shape).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("dispatch task ended abnormally: {e}"),
            }
        }

        let results = results
            .into_iter()
            .zip(targets)
            .map(|(slot, (role, endpoint))| {
                slot.unwrap_or_else(|| {
                    let lost = CommandError::Transport { message: "dispatch task ended without a result".to_string() };
                    DispatchResult {
                        endpoint,
                        role,
                        success: false,
                        mapped: None,
                        degraded: false,
                        error: Some(lost.into()),
                    }
                })
            })
            .collect();

        let report = DispatchReport { id, action, results };
        if report.failed() == 0 {
            info!(id = %report.id, "{}", report.log_summary());
        } else {
            warn!(id = %report.id, "{}", report.log_summary());
        }
        report
    }
}

impl Delivery {
    async fn deliver(
        &self,
        action: &MirrorAction,
        role: DeviceRole,
        endpoint: DeviceEndpoint,
        shape: Shape,
    ) -> DispatchResult {
        let plan = self.plan(role, endpoint, shape).await;
        let Some(primitive) = plan.primitive.clone() else {
            debug!(device = %plan.endpoint, "{action} falls in a letterbox region; dropped");
            return plan.result(false, Some(DispatchError::MappingOutOfSurface));
        };

        let outcome = self.executor.execute(&plan.endpoint, &primitive).await;
        if outcome.success {
            debug!(
                device = %plan.endpoint,
                x = plan.mapped.map(|p| p.x),
                y = plan.mapped.map(|p| p.y),
                "{action} delivered"
            );
        }
        plan.result(outcome.success, outcome.error.map(DispatchError::from))
    }

    async fn plan(&self, role: DeviceRole, endpoint: DeviceEndpoint, shape: Shape) -> Plan {
        match (role, shape) {
            (_, Shape::Verbatim(primitive)) => {
                Plan { endpoint, role, primitive: Some(primitive), mapped: None, degraded: false }
            }
            (DeviceRole::Master, Shape::Tap(p)) => Plan::send(role, endpoint, InputPrimitive::Tap { at: p }, p, false),
            (DeviceRole::Master, Shape::Swipe { start, end, duration_ms }) => {
                Plan::send(role, endpoint, InputPrimitive::Swipe { start, end, duration_ms }, end, false)
            }
            (DeviceRole::Slave, Shape::Tap(p)) => {
                let (master, own) = self.geometries(&endpoint).await;
                match place(self.slave_mode, p, &master, &own) {
                    Placement::Mapped(at) => Plan::send(role, endpoint, InputPrimitive::Tap { at }, at, false),
                    Placement::Degraded(at) => {
                        warn_degraded(&endpoint, &master, &own);
                        Plan::send(role, endpoint, InputPrimitive::Tap { at }, at, true)
                    }
                    Placement::OutOfSurface => Plan::skip(endpoint),
                }
            }
            (DeviceRole::Slave, Shape::Swipe { start, end, duration_ms }) => {
                let (master, own) = self.geometries(&endpoint).await;
                let from = place(self.slave_mode, start, &master, &own);
                let to = place(self.slave_mode, end, &master, &own);
                match (from, to) {
                    (Placement::OutOfSurface, _) | (_, Placement::OutOfSurface) => Plan::skip(endpoint),
                    (Placement::Mapped(s), Placement::Mapped(e)) => {
                        Plan::send(role, endpoint, InputPrimitive::Swipe { start: s, end: e, duration_ms }, e, false)
                    }
                    (Placement::Mapped(s) | Placement::Degraded(s), Placement::Mapped(e) | Placement::Degraded(e)) => {
                        warn_degraded(&endpoint, &master, &own);
                        Plan::send(role, endpoint, InputPrimitive::Swipe { start: s, end: e, duration_ms }, e, true)
                    }
                }
            }
        }
    }

    /// Master and slave geometry, looked up concurrently.
    async fn geometries(&self, slave: &DeviceEndpoint) -> (ScreenGeometry, ScreenGeometry) {
        tokio::join!(self.cache.resolve(&self.master), self.cache.resolve(slave))
    }
}

fn place(mode: MappingMode, p: Point, master: &ScreenGeometry, slave: &ScreenGeometry) -> Placement {
    if !master.is_valid() || !slave.is_valid() {
        return Placement::Degraded(p);
    }
    match map_point_with(mode, p, &master.as_rect(), slave) {
        Some(mapped) => Placement::Mapped(mapped),
        None => Placement::OutOfSurface,
    }
}

fn warn_degraded(slave: &DeviceEndpoint, master: &ScreenGeometry, own: &ScreenGeometry) {
    warn!(
        device = %slave,
        "sending unscaled coordinates (master {master}, slave {own}); input may land in the wrong place"
    );
}

impl Plan {
    fn send(
        role: DeviceRole,
        endpoint: DeviceEndpoint,
        primitive: InputPrimitive,
        mapped: Point,
        degraded: bool,
    ) -> Self {
        Self { endpoint, role, primitive: Some(primitive), mapped: Some(mapped), degraded }
    }

    /// A slave whose point fell in a letterbox region.
    fn skip(endpoint: DeviceEndpoint) -> Self {
        Self { endpoint, role: DeviceRole::Slave, primitive: None, mapped: None, degraded: false }
    }

    fn result(&self, success: bool, error: Option<DispatchError>) -> DispatchResult {
        DispatchResult {
            endpoint: self.endpoint.clone(),
            role: self.role,
            success,
            mapped: self.mapped,
            degraded: self.degraded,
            error,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
