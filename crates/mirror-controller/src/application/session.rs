//! MirrorSession: lifecycle of one interactive mirroring session.
//!
//! # Start sequence
//!
//! 1. Probe every device (`echo ok`).  No reachable device is fatal;
//!    unreachable slaves only produce a warning, and their results will
//!    show up as per-device failures.
//! 2. Warm the geometry cache for the whole device set.
//! 3. Start the mirroring display, if one is configured, and wait briefly for
//!    its window to appear.
//! 4. Start the input source and spawn two tasks: the input loop
//!    ([`MirrorInputUseCase::run`]) and the dispatch loop
//!    ([`run_dispatch_loop`]), connected by an unbounded channel.
//!
//! # Shutdown
//!
//! [`MirrorSession::shutdown`] raises the stop signal, stops the input
//! source, and gives both tasks a bounded join window.  Tasks still running
//! after the window are aborted.  The display is terminated last.

use std::sync::Arc;
use std::time::Duration;

use mirror_core::{DeviceEndpoint, DeviceSet, GestureClassifier, MappingMode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::dispatch_action::ActionDispatcher;
use super::execute_command::{CommandExecutor, DeviceBridge, Timeouts};
use super::mirror_input::{run_dispatch_loop, MirrorInputSettings, MirrorInputUseCase};
use super::resolve_geometry::ScreenGeometryCache;
use super::stop_signal::{stop_pair, StopHandle, StopSignal};
use crate::infrastructure::display::{DisplayError, DisplayProcess, DisplayStatus};
use crate::infrastructure::input_capture::{CaptureError, InputSource};
use crate::infrastructure::surface::{render_frame, SurfaceLocator};

/// Default time tasks get to finish after stop is requested.
pub const DEFAULT_JOIN_WINDOW: Duration = Duration::from_secs(2);

const DISPLAY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const SURFACE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Session-fatal errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("none of the {0} configured device(s) answered")]
    NoReachableTarget(usize),

    #[error("screen mirroring could not be started: {0}")]
    Display(#[from] DisplayError),

    #[error("input capture could not be started: {0}")]
    Capture(#[from] CaptureError),
}

impl SessionError {
    /// What the operator should do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            SessionError::NoReachableTarget(_) => {
                "check the device identifiers and that every device is connected: adb devices"
            }
            SessionError::Display(e) => e.remediation(),
            SessionError::Capture(_) => "check that the event script exists and is readable",
        }
    }
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub input: MirrorInputSettings,
    pub drag_threshold: u32,
    pub slave_mode: MappingMode,
    pub timeouts: Timeouts,
    /// Deadline for reachability and geometry queries.
    pub probe_timeout: Duration,
    pub join_window: Duration,
    /// How long to wait for the mirroring window after the display starts.
    pub surface_wait: Duration,
    /// Back-off before re-querying a device whose geometry failed.
    pub geometry_retry: Duration,
}

/// Collaborators a session is built from.
pub struct SessionParts {
    pub devices: DeviceSet,
    pub bridge: Arc<dyn DeviceBridge>,
    pub locator: Arc<dyn SurfaceLocator>,
    pub input: Box<dyn InputSource>,
    pub display: Option<Box<dyn DisplayProcess>>,
}

/// Counts reported when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    /// Actions produced by the input loop.
    pub forwarded: usize,
    /// Actions fanned out to the devices.
    pub dispatched: usize,
    /// Tasks that missed the join window.
    pub aborted: usize,
}

enum Wake {
    Stopped,
    Finished(usize),
    Tick,
}

pub struct MirrorSession {
    stop: StopHandle,
    input_source: Box<dyn InputSource>,
    display: Option<Box<dyn DisplayProcess>>,
    input_task: Option<JoinHandle<usize>>,
    dispatch_task: Option<JoinHandle<usize>>,
    dispatched: Option<usize>,
    reachable: Vec<DeviceEndpoint>,
    join_window: Duration,
}

impl MirrorSession {
    /// Runs the start sequence and returns a running session.
    pub async fn start(parts: SessionParts, settings: SessionSettings) -> Result<Self, SessionError> {
        let SessionParts { devices, bridge, locator, input, mut display } = parts;

        let reachable = probe(&bridge, &devices, settings.probe_timeout).await;
        if reachable.is_empty() {
            return Err(SessionError::NoReachableTarget(devices.len()));
        }
        if !reachable.contains(devices.master()) {
            warn!(device = %devices.master(), "master is not reachable; only slaves will receive input");
        }

        let cache = Arc::new(
            ScreenGeometryCache::new(Arc::clone(&bridge), settings.probe_timeout)
                .with_retry_after(settings.geometry_retry),
        );
        cache.warm(&devices.endpoints()).await;

        if let Some(display) = display.as_mut() {
            display.start().await?;
            wait_for_surface(locator.as_ref(), &settings.input.window_title, settings.surface_wait).await;
        }

        let events = match input.start() {
            Ok(events) => events,
            Err(e) => {
                if let Some(display) = display.as_mut() {
                    display.terminate().await;
                }
                return Err(e.into());
            }
        };

        let (stop, signal) = stop_pair();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let executor = CommandExecutor::new(Arc::clone(&bridge), settings.timeouts);
        let master = devices.master().clone();
        let slave_count = devices.slaves().len();
        let dispatcher = Arc::new(ActionDispatcher::new(
            devices,
            Arc::clone(&cache),
            executor,
            settings.slave_mode,
            settings.input.swipe_duration_ms,
        ));
        let classifier = GestureClassifier::new(settings.drag_threshold, settings.input.swipe_duration_ms);
        let input_loop = MirrorInputUseCase::new(locator, cache, master, classifier, settings.input, actions_tx);

        let input_task = tokio::spawn(input_loop.run(events, signal.clone()));
        let dispatch_task = tokio::spawn(run_dispatch_loop(dispatcher, actions_rx, signal));
        info!("mirroring session started: master + {slave_count} slave(s)");

        Ok(Self {
            stop,
            input_source: input,
            display,
            input_task: Some(input_task),
            dispatch_task: Some(dispatch_task),
            dispatched: None,
            reachable,
            join_window: settings.join_window,
        })
    }

    /// Devices that answered the start-up probe, in device-set order.
    pub fn reachable(&self) -> &[DeviceEndpoint] {
        &self.reachable
    }

    /// A signal that fires when this session is asked to stop.
    pub fn signal(&self) -> StopSignal {
        self.stop.signal()
    }

    /// Requests the session to stop; [`shutdown`](Self::shutdown) completes it.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Waits until the input stream is exhausted and every action has been
    /// dispatched, stop is requested, or the display exits.
    pub async fn wait(&mut self) {
        let signal = self.stop.signal();
        let mut ticker = tokio::time::interval(DISPLAY_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake = {
                let Some(dispatch) = self.dispatch_task.as_mut() else {
                    return;
                };
                tokio::select! {
                    _ = signal.stopped() => Wake::Stopped,
                    joined = dispatch => Wake::Finished(joined.unwrap_or(0)),
                    _ = ticker.tick() => Wake::Tick,
                }
            };
            match wake {
                Wake::Stopped => return,
                Wake::Finished(dispatched) => {
                    self.dispatch_task = None;
                    self.dispatched = Some(dispatched);
                    return;
                }
                Wake::Tick => {
                    if let Some(DisplayStatus::Exited(code)) = self.display.as_mut().map(|d| d.poll()) {
                        warn!("mirroring display exited (status {code:?}); stopping session");
                        self.stop.stop();
                        return;
                    }
                }
            }
        }
    }

    /// Stops everything and returns the session counts.
    pub async fn shutdown(mut self) -> SessionSummary {
        self.stop.stop();
        self.input_source.stop();

        let deadline = Instant::now() + self.join_window;
        let mut summary = SessionSummary::default();
        if let Some(task) = self.input_task.take() {
            match join_until(task, deadline).await {
                Some(forwarded) => summary.forwarded = forwarded,
                None => summary.aborted += 1,
            }
        }
        match (self.dispatch_task.take(), self.dispatched) {
            (Some(task), _) => match join_until(task, deadline).await {
                Some(dispatched) => summary.dispatched = dispatched,
                None => summary.aborted += 1,
            },
            (None, Some(dispatched)) => summary.dispatched = dispatched,
            (None, None) => {}
        }
        if summary.aborted > 0 {
            warn!("{} task(s) did not stop within {:?} and were aborted", summary.aborted, self.join_window);
        }

        if let Some(display) = self.display.as_mut() {
            display.terminate().await;
        }
        info!(
            forwarded = summary.forwarded,
            dispatched = summary.dispatched,
            "mirroring session stopped"
        );
        summary
    }
}

/// Joins `task` by `deadline`, aborting it otherwise.
async fn join_until(mut task: JoinHandle<usize>, deadline: Instant) -> Option<usize> {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            error!("session task failed: {e}");
            Some(0)
        }
        Err(_) => {
            task.abort();
            None
        }
    }
}

/// Returns the devices that answer `echo ok` within `timeout`, in set order.
async fn probe(bridge: &Arc<dyn DeviceBridge>, devices: &DeviceSet, timeout: Duration) -> Vec<DeviceEndpoint> {
    let endpoints = devices.endpoints();
    let mut tasks = JoinSet::new();
    for (index, endpoint) in endpoints.iter().enumerate() {
        let bridge = Arc::clone(bridge);
        let endpoint = endpoint.clone();
        tasks.spawn(async move {
            let answered = matches!(
                tokio::time::timeout(timeout, bridge.query_text(&endpoint, "echo ok")).await,
                Ok(Ok(text)) if text.trim() == "ok"
            );
            (index, answered)
        });
    }

    let mut answered = vec![false; endpoints.len()];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, ok)) = joined {
            answered[index] = ok;
        }
    }

    endpoints
        .into_iter()
        .zip(answered)
        .filter_map(|(endpoint, ok)| {
            if !ok {
                warn!(device = %endpoint, "device did not answer; its commands will fail");
            }
            ok.then_some(endpoint)
        })
        .collect()
}

async fn wait_for_surface(locator: &dyn SurfaceLocator, title: &str, patience: Duration) {
    let deadline = Instant::now() + patience;
    loop {
        if let Ok(frame) = render_frame(locator, title) {
            info!("mirroring window found: {}x{} client area", frame.client_width, frame.client_height);
            return;
        }
        if Instant::now() >= deadline {
            warn!("mirroring window `{title}` not found yet; pointer input stays paused until it appears");
            return;
        }
        tokio::time::sleep(SURFACE_POLL_INTERVAL).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mirror_input::DEFAULT_SCROLL_DISTANCE;
    use crate::infrastructure::device_bridge::mock::MockDeviceBridge;
    use crate::infrastructure::display::mock::MockDisplay;
    use crate::infrastructure::input_capture::mock::MockInputSource;
    use crate::infrastructure::input_capture::{MouseButton, RawInputEvent};
    use crate::infrastructure::surface::mock::MockSurfaceLocator;
    use mirror_core::Rect;

    fn settings() -> SessionSettings {
        SessionSettings {
            input: MirrorInputSettings {
                window_title: "Phone Master".to_string(),
                scroll_distance: DEFAULT_SCROLL_DISTANCE,
                swipe_duration_ms: 300,
                right_click_back: true,
            },
            drag_threshold: 10,
            slave_mode: MappingMode::Letterbox,
            timeouts: Timeouts::default(),
            probe_timeout: Duration::from_millis(200),
            join_window: Duration::from_millis(500),
            surface_wait: Duration::from_millis(50),
            geometry_retry: Duration::from_secs(30),
        }
    }

    fn devices() -> DeviceSet {
        DeviceSet::new(DeviceEndpoint::new("m"), vec![DeviceEndpoint::new("s")]).unwrap()
    }

    fn locator() -> MockSurfaceLocator {
        let locator = MockSurfaceLocator::new();
        locator.show("Phone Master", Rect::new(0, 0, 540, 1200), Rect::at_origin(540, 1200));
        locator
    }

    fn parts(bridge: MockDeviceBridge, input: MockInputSource, display: Option<MockDisplay>) -> SessionParts {
        SessionParts {
            devices: devices(),
            bridge: Arc::new(bridge),
            locator: Arc::new(locator()),
            input: Box::new(input),
            display: display.map(|d| Box::new(d) as Box<dyn DisplayProcess>),
        }
    }

    #[tokio::test]
    async fn test_no_reachable_device_is_fatal() {
        // Arrange
        let bridge = MockDeviceBridge::new();

        // Act
        let result = MirrorSession::start(parts(bridge, MockInputSource::new(), None), settings()).await;

        // Assert
        let err = result.err().expect("start must fail");
        assert!(matches!(err, SessionError::NoReachableTarget(2)));
        assert!(err.remediation().contains("adb devices"));
    }

    #[tokio::test]
    async fn test_display_failure_is_fatal_with_remediation() {
        let bridge = MockDeviceBridge::new().with_device("m", 1080, 2400).with_device("s", 720, 1600);
        let display = MockDisplay::new().failing(DisplayError::StartupFailed { stderr: "no device".into() });

        let result = MirrorSession::start(parts(bridge, MockInputSource::new(), Some(display)), settings()).await;

        let err = result.err().expect("start must fail");
        assert!(matches!(err, SessionError::Display(_)));
        assert_eq!(err.remediation(), "make sure the master device is connected: adb devices");
    }

    #[tokio::test]
    async fn test_session_mirrors_click_to_every_device() {
        // Arrange
        let bridge = MockDeviceBridge::new().with_device("m", 1080, 2400).with_device("s", 720, 1600);
        let input = MockInputSource::new();
        let display = MockDisplay::new();
        let session_parts = parts(bridge.clone(), input.clone(), Some(display.clone()));
        let mut session = MirrorSession::start(session_parts, settings()).await.unwrap();

        // Act – click the centre of the 540x1200 window, then end the stream.
        input.inject_event(RawInputEvent::ButtonDown { button: MouseButton::Left, x: 270, y: 600 });
        input.inject_event(RawInputEvent::ButtonUp { button: MouseButton::Left, x: 270, y: 600 });
        input.stop();
        tokio::time::timeout(Duration::from_secs(2), session.wait()).await.unwrap();
        let summary = session.shutdown().await;

        // Assert
        assert_eq!(summary, SessionSummary { forwarded: 1, dispatched: 1, aborted: 0 });
        assert_eq!(bridge.sent_to("m"), vec!["input tap 540 1200".to_string()]);
        assert_eq!(bridge.sent_to("s"), vec!["input tap 360 800".to_string()]);
        assert_eq!((display.starts(), display.terminations()), (1, 1));
    }

    #[tokio::test]
    async fn test_unreachable_slave_does_not_prevent_start() {
        let bridge = MockDeviceBridge::new().with_device("m", 1080, 2400);

        let session = MirrorSession::start(parts(bridge, MockInputSource::new(), None), settings()).await.unwrap();

        assert_eq!(session.reachable(), [DeviceEndpoint::new("m")]);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_aborts_dispatch_stuck_on_hanging_device() {
        // Arrange – the slave never answers commands.
        let bridge = MockDeviceBridge::new().with_device("m", 1080, 2400).with_device("s", 720, 1600);
        let input = MockInputSource::new();
        let mut session = MirrorSession::start(parts(bridge.clone(), input.clone(), None), settings()).await.unwrap();
        let hanging = bridge.hanging("s");

        // Act
        input.inject_event(RawInputEvent::Key { key: mirror_core::HostKey::Enter });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.stop();
        session.wait().await;
        let summary = tokio::time::timeout(Duration::from_secs(2), session.shutdown()).await.unwrap();

        // Assert – stop abandons the in-flight dispatch instead of waiting 5 s.
        assert_eq!(summary.aborted, 0);
        assert_eq!(summary.forwarded, 1);
        assert_eq!(hanging.sent_to("s"), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_display_exit_stops_session() {
        let bridge = MockDeviceBridge::new().with_device("m", 1080, 2400).with_device("s", 720, 1600);
        let display = MockDisplay::new();
        let mut session =
            MirrorSession::start(parts(bridge, MockInputSource::new(), Some(display.clone())), settings()).await.unwrap();

        display.exit(1);
        tokio::time::timeout(Duration::from_secs(3), session.wait()).await.unwrap();

        assert!(session.signal().is_stopped());
        session.shutdown().await;
    }
}
