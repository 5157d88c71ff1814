//! MirrorInputUseCase: turns raw host input on the rendering surface into
//! [`MirrorAction`]s.
//!
//! This use case runs on its own task.  For every event it:
//!
//! 1. re-measures the rendering surface (the window may have moved),
//! 2. hit-tests the event against the window,
//! 3. maps the point from the client area onto the master's screen,
//! 4. feeds press/release samples through the [`GestureClassifier`],
//! 5. forwards completed actions over a channel to the dispatch task.
//!
//! Step 5 never waits for delivery: dispatch happens on
//! [`run_dispatch_loop`], so a slow device cannot stall classification.
//!
//! # Pointer semantics
//!
//! | Host input                      | Action                              |
//! |---------------------------------|-------------------------------------|
//! | left press + release            | tap or drag (classifier)            |
//! | right press inside the window   | `KEYCODE_BACK`                      |
//! | wheel inside the window         | vertical swipe centred on pointer   |
//! | any press outside the window    | cancels a pending drag              |
//! | keyboard                        | key event or text via [`KeyMapper`] |

use std::sync::Arc;

use mirror_core::{
    map_point, AndroidKeyCode, DeviceEndpoint, Gesture, GestureClassifier, KeyMapper, KeyMapping, Point,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::dispatch_action::{ActionDispatcher, MirrorAction};
use super::resolve_geometry::ScreenGeometryCache;
use super::stop_signal::StopSignal;
use crate::infrastructure::input_capture::{MouseButton, RawInputEvent};
use crate::infrastructure::surface::{render_frame, RenderSurfaceFrame, SurfaceLocator};

/// Default half-length of a wheel swipe, in master device pixels.
pub const DEFAULT_SCROLL_DISTANCE: u32 = 300;

/// Tunables for [`MirrorInputUseCase`].
#[derive(Debug, Clone)]
pub struct MirrorInputSettings {
    /// Title substring of the mirroring window.
    pub window_title: String,
    pub scroll_distance: u32,
    pub swipe_duration_ms: u32,
    /// Map a right-button press to `KEYCODE_BACK`.
    pub right_click_back: bool,
}

pub struct MirrorInputUseCase {
    locator: Arc<dyn SurfaceLocator>,
    cache: Arc<ScreenGeometryCache>,
    master: DeviceEndpoint,
    classifier: GestureClassifier,
    settings: MirrorInputSettings,
    actions: mpsc::UnboundedSender<MirrorAction>,
    surface_lost: bool,
}

impl MirrorInputUseCase {
    pub fn new(
        locator: Arc<dyn SurfaceLocator>,
        cache: Arc<ScreenGeometryCache>,
        master: DeviceEndpoint,
        classifier: GestureClassifier,
        settings: MirrorInputSettings,
        actions: mpsc::UnboundedSender<MirrorAction>,
    ) -> Self {
        Self { locator, cache, master, classifier, settings, actions, surface_lost: false }
    }

    /// Consumes events until the source closes, stop is requested, or the
    /// dispatch side goes away.  Returns the number of actions forwarded.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<RawInputEvent>, stop: StopSignal) -> usize {
        let mut forwarded = 0;
        loop {
            let event = tokio::select! {
                _ = stop.stopped() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Some(action) = self.handle_event(event).await {
                if self.actions.send(action).is_err() {
                    break;
                }
                forwarded += 1;
            }
        }
        debug!("input mirroring loop finished after {forwarded} action(s)");
        forwarded
    }

    /// Processes one event and returns the action it completes, if any.
    pub async fn handle_event(&mut self, event: RawInputEvent) -> Option<MirrorAction> {
        match event {
            RawInputEvent::ButtonDown { button: MouseButton::Left, x, y } => {
                let p = Point::new(x, y);
                let Some(frame) = self.hit(p) else {
                    self.classifier.cancel();
                    return None;
                };
                let mapped = self.to_master(p, &frame).await;
                debug!("press screen{p} -> master {mapped:?}");
                self.classifier.press(mapped);
                None
            }
            RawInputEvent::ButtonUp { button: MouseButton::Left, x, y } => {
                let p = Point::new(x, y);
                let Some(frame) = self.hit(p) else {
                    self.classifier.cancel();
                    return None;
                };
                let mapped = self.to_master(p, &frame).await;
                debug!("release screen{p} -> master {mapped:?}");
                self.classifier.release(mapped).map(MirrorAction::Gesture)
            }
            RawInputEvent::ButtonDown { button: MouseButton::Right, x, y } => {
                if self.hit(Point::new(x, y)).is_none() {
                    self.classifier.cancel();
                    return None;
                }
                self.settings.right_click_back.then_some(MirrorAction::Key(AndroidKeyCode::Back))
            }
            RawInputEvent::ButtonDown { .. } | RawInputEvent::ButtonUp { .. } => None,
            RawInputEvent::Scroll { x, y, delta } => self.scroll(Point::new(x, y), delta).await,
            RawInputEvent::Key { key } => match KeyMapper::host_to_android(key)? {
                KeyMapping::Key(code) => Some(MirrorAction::Key(code)),
                KeyMapping::Text(c) => Some(MirrorAction::Text(c.to_string())),
            },
        }
    }

    async fn scroll(&mut self, p: Point, delta: i32) -> Option<MirrorAction> {
        if delta == 0 {
            return None;
        }
        let frame = self.hit(p)?;
        let centre = self.to_master(p, &frame).await?;
        let geometry = self.cache.resolve(&self.master).await;
        let max_y = i32::try_from(geometry.height.saturating_sub(1)).unwrap_or(i32::MAX);
        let distance = i32::try_from(self.settings.scroll_distance).unwrap_or(i32::MAX);

        let above = Point::new(centre.x, centre.y.saturating_sub(distance).clamp(0, max_y));
        let below = Point::new(centre.x, centre.y.saturating_add(distance).clamp(0, max_y));
        let (start, end) = if delta > 0 { (above, below) } else { (below, above) };
        Some(MirrorAction::Gesture(Gesture::Drag { start, end, duration_ms: self.settings.swipe_duration_ms }))
    }

    /// Measures the surface and returns it if `p` is on the window.
    fn hit(&mut self, p: Point) -> Option<RenderSurfaceFrame> {
        let frame = match render_frame(self.locator.as_ref(), &self.settings.window_title) {
            Ok(frame) => frame,
            Err(e) => {
                if !self.surface_lost {
                    warn!("{e}; pointer mirroring is paused until the mirroring window reappears");
                    self.surface_lost = true;
                }
                return None;
            }
        };
        if self.surface_lost {
            info!("mirroring window found again; pointer mirroring resumed");
            self.surface_lost = false;
        }
        frame.contains(p).then_some(frame)
    }

    /// Maps a screen point inside the client area onto the master screen.
    ///
    /// `None` when the master geometry is unresolved or the point lies in the
    /// title bar or a letterbox bar.
    async fn to_master(&self, p: Point, frame: &RenderSurfaceFrame) -> Option<Point> {
        let geometry = self.cache.resolve(&self.master).await;
        if !geometry.is_valid() {
            return None;
        }
        let client = frame.client_area();
        if !client.contains(p) {
            return None;
        }
        map_point(p, &client, &geometry)
    }
}

/// Dispatches actions one at a time, in arrival order, until the channel
/// closes or stop is requested.  Returns the number of actions dispatched.
///
/// A dispatch in flight when stop arrives is abandoned; its per-device tasks
/// are aborted.
pub async fn run_dispatch_loop(
    dispatcher: Arc<ActionDispatcher>,
    mut actions: mpsc::UnboundedReceiver<MirrorAction>,
    stop: StopSignal,
) -> usize {
    let mut dispatched = 0;
    loop {
        let action = tokio::select! {
            _ = stop.stopped() => break,
            action = actions.recv() => match action {
                Some(action) => action,
                None => break,
            },
        };
        tokio::select! {
            _ = stop.stopped() => break,
            _report = dispatcher.dispatch(&action) => dispatched += 1,
        }
    }
    debug!("dispatch loop finished after {dispatched} action(s)");
    dispatched
}

// ── Tests ─────────────────────────────────────────────────────────────────────
