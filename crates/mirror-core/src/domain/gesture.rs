//! Tap/drag classification.
//!
//! The classifier is fed press and release samples that have already been
//! mapped to master-device coordinates.  A sample that could not be mapped
//! (outside the surface, or inside a letterbox bar) arrives as `None`.

use serde::{Deserialize, Serialize};

use super::mapping::Point;

/// Per-axis movement (device pixels) above which a press/release pair is a drag.
pub const DEFAULT_DRAG_THRESHOLD: u32 = 10;

/// Swipe duration hint used for drags when none is configured.
pub const DEFAULT_SWIPE_DURATION_MS: u32 = 300;

/// A completed single-pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Gesture {
    Tap { at: Point },
    Drag { start: Point, end: Point, duration_ms: u32 },
}

impl Gesture {
    /// Point where the pointer was released.
    pub fn end(&self) -> Point {
        match self {
            Gesture::Tap { at } => *at,
            Gesture::Drag { end, .. } => *end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    PointerDown(Point),
}

/// Two-state machine: `Idle` and `PointerDown(start)`.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    state: State,
    drag_threshold: u32,
    swipe_duration_ms: u32,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD, DEFAULT_SWIPE_DURATION_MS)
    }
}

impl GestureClassifier {
    pub fn new(drag_threshold: u32, swipe_duration_ms: u32) -> Self {
        Self { state: State::Idle, drag_threshold, swipe_duration_ms }
    }

    /// Records a press.  An unmapped press cancels any pending one.
    pub fn press(&mut self, at: Option<Point>) {
        self.state = match at {
            Some(p) => State::PointerDown(p),
            None => State::Idle,
        };
    }

    /// Records a release and returns the classified gesture, if any.
    ///
    /// The classifier is always `Idle` afterwards.
    pub fn release(&mut self, at: Option<Point>) -> Option<Gesture> {
        let State::PointerDown(start) = std::mem::replace(&mut self.state, State::Idle) else {
            return None;
        };
        let end = at?;
        if start.max_axis_delta(&end) > self.drag_threshold {
            Some(Gesture::Drag { start, end, duration_ms: self.swipe_duration_ms })
        } else {
            Some(Gesture::Tap { at: end })
        }
    }

    /// Drops any pending press.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }

    /// Returns `true` while a press is waiting for its release.
    pub fn is_pointer_down(&self) -> bool {
        matches!(self.state, State::PointerDown(_))
    }

    pub fn drag_threshold(&self) -> u32 {
        self.drag_threshold
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release_in_place_is_tap() {
        // Arrange
        let mut c = GestureClassifier::default();

        // Act
        c.press(Some(Point::new(100, 100)));
        let g = c.release(Some(Point::new(100, 100)));

        // Assert
        assert_eq!(g, Some(Gesture::Tap { at: Point::new(100, 100) }));
        assert!(!c.is_pointer_down());
    }

    #[test]
    fn test_large_movement_is_drag() {
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(100, 100)));
        let g = c.release(Some(Point::new(500, 500)));
        assert_eq!(
            g,
            Some(Gesture::Drag {
                start: Point::new(100, 100),
                end: Point::new(500, 500),
                duration_ms: DEFAULT_SWIPE_DURATION_MS,
            })
        );
    }

    #[test]
    fn test_movement_equal_to_threshold_is_tap() {
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(100, 100)));
        let g = c.release(Some(Point::new(110, 90)));
        assert_eq!(g, Some(Gesture::Tap { at: Point::new(110, 90) }));
    }

    #[test]
    fn test_single_axis_over_threshold_is_drag() {
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(100, 100)));
        assert!(matches!(c.release(Some(Point::new(100, 111))), Some(Gesture::Drag { .. })));
    }

    #[test]
    fn test_release_without_press_is_dropped() {
        let mut c = GestureClassifier::default();
        assert_eq!(c.release(Some(Point::new(5, 5))), None);
    }

    #[test]
    fn test_unmapped_press_cancels_pending_press() {
        // Arrange
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(10, 10)));

        // Act – second press lands in a letterbox bar
        c.press(None);

        // Assert
        assert!(!c.is_pointer_down());
        assert_eq!(c.release(Some(Point::new(10, 10))), None);
    }

    #[test]
    fn test_unmapped_release_drops_and_returns_to_idle() {
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(10, 10)));
        assert_eq!(c.release(None), None);
        assert!(!c.is_pointer_down());
    }

    #[test]
    fn test_cancel_clears_pending_press() {
        let mut c = GestureClassifier::default();
        c.press(Some(Point::new(1, 1)));
        c.cancel();
        assert_eq!(c.release(Some(Point::new(1, 1))), None);
    }

    #[test]
    fn test_custom_threshold_and_duration_apply() {
        let mut c = GestureClassifier::new(50, 120);
        c.press(Some(Point::new(0, 0)));
        assert_eq!(c.release(Some(Point::new(40, 40))), Some(Gesture::Tap { at: Point::new(40, 40) }));
        c.press(Some(Point::new(0, 0)));
        assert!(matches!(
            c.release(Some(Point::new(60, 0))),
            Some(Gesture::Drag { duration_ms: 120, .. })
        ));
    }
}
