//! Rendering-surface lookup.
//!
//! The mirroring display shows the master screen in a host window.  Pointer
//! events arrive in host screen coordinates, so each press or release needs
//! the window's current client area to be mapped onto the master device.
//!
//! [`SurfaceLocator`] exposes the four window-system queries that mapping
//! needs.  [`render_frame`] combines them into a [`RenderSurfaceFrame`]; it is
//! called for every press and release and its result is never cached, since
//! the window may be moved or resized at any time.

use mirror_core::{Point, Rect};
use thiserror::Error;

pub mod mock;

/// Title substring used when the configured title matches no window.
pub const FALLBACK_TITLE: &str = "scrcpy";

/// Opaque reference to a located window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("no window matching `{0}` was found")]
    NotFound(String),
    #[error("window query failed: {0}")]
    Query(String),
}

/// Window-system queries used to map pointer events.
pub trait SurfaceLocator: Send + Sync {
    /// Finds a window whose title contains `title_substring` (case-insensitive).
    fn find_surface(&self, title_substring: &str) -> Option<SurfaceHandle>;

    /// Outer window rectangle in screen coordinates, decorations included.
    fn bounding_rect(&self, surface: &SurfaceHandle) -> Result<Rect, SurfaceError>;

    /// Client area size.  The returned rectangle is in client coordinates,
    /// so its origin is `(0, 0)`.
    fn client_rect(&self, surface: &SurfaceHandle) -> Result<Rect, SurfaceError>;

    /// Converts a client-area point to screen coordinates.
    fn client_to_screen(&self, surface: &SurfaceHandle, point: Point) -> Result<Point, SurfaceError>;
}

/// The part of the surface that shows device pixels, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSurfaceFrame {
    /// Outer window rectangle, used for hit testing.
    pub bounds: Rect,
    pub client_origin: Point,
    pub client_width: u32,
    pub client_height: u32,
}

impl RenderSurfaceFrame {
    /// Client area as a screen-space rectangle: the source rect for mapping.
    pub fn client_area(&self) -> Rect {
        Rect::new(self.client_origin.x, self.client_origin.y, self.client_width, self.client_height)
    }

    /// `true` if `p` lies anywhere on the window, title bar included.
    pub fn contains(&self, p: Point) -> bool {
        self.bounds.contains(p)
    }
}

/// Locates the surface titled `title` (or any `scrcpy` window) and measures it.
///
/// When client-to-screen conversion fails the client area is assumed to sit
/// at the bottom of the bounding rectangle, below the title bar.
pub fn render_frame(locator: &dyn SurfaceLocator, title: &str) -> Result<RenderSurfaceFrame, SurfaceError> {
    let surface = locator
        .find_surface(title)
        .or_else(|| locator.find_surface(FALLBACK_TITLE))
        .ok_or_else(|| SurfaceError::NotFound(title.to_string()))?;

    let bounds = locator.bounding_rect(&surface)?;
    let client = locator.client_rect(&surface)?;
    let client_origin = match locator.client_to_screen(&surface, Point::new(0, 0)) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::debug!("client-to-screen failed ({e}); estimating client origin");
            let title_bar = bounds.height.saturating_sub(client.height);
            Point::new(bounds.x, bounds.y.saturating_add(title_bar as i32))
        }
    };

    Ok(RenderSurfaceFrame {
        bounds,
        client_origin,
        client_width: client.width,
        client_height: client.height,
    })
}

/// A locator for a surface at a fixed, configured screen position.
///
/// Used when no window-system integration is available: the operator states
/// where the mirrored screen is drawn.
#[derive(Debug, Clone)]
pub struct StaticSurfaceLocator {
    client_area: Rect,
    title_bar: u32,
}

impl StaticSurfaceLocator {
    /// `client_area` is in screen coordinates.  `title_bar` pixels of window
    /// decoration are assumed above it.
    pub fn new(client_area: Rect, title_bar: u32) -> Self {
        Self { client_area, title_bar }
    }
}

impl SurfaceLocator for StaticSurfaceLocator {
    fn find_surface(&self, _title_substring: &str) -> Option<SurfaceHandle> {
        Some(SurfaceHandle { id: 0, title: "static".to_string() })
    }

    fn bounding_rect(&self, _surface: &SurfaceHandle) -> Result<Rect, SurfaceError> {
        let area = self.client_area;
        Ok(Rect::new(
            area.x,
            area.y.saturating_sub(self.title_bar as i32),
            area.width,
            area.height.saturating_add(self.title_bar),
        ))
    }

    fn client_rect(&self, _surface: &SurfaceHandle) -> Result<Rect, SurfaceError> {
        Ok(Rect::at_origin(self.client_area.width, self.client_area.height))
    }

    fn client_to_screen(&self, _surface: &SurfaceHandle, point: Point) -> Result<Point, SurfaceError> {
        Ok(Point::new(self.client_area.x + point.x, self.client_area.y + point.y))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MockSurfaceLocator;
    use super::*;

    #[test]
    fn test_render_frame_uses_client_to_screen_origin() {
        // Arrange – 30 px title bar above an 800x1200 client area.
        let locator = MockSurfaceLocator::new();
        locator.show("SM-G991B mirror", Rect::new(300, 20, 800, 1230), Rect::at_origin(800, 1200));

        // Act
        let frame = render_frame(&locator, "mirror").unwrap();

        // Assert
        assert_eq!(frame.client_origin, Point::new(300, 50));
        assert_eq!(frame.client_area(), Rect::new(300, 50, 800, 1200));
    }

    #[test]
    fn test_render_frame_estimates_origin_when_conversion_fails() {
        let locator = MockSurfaceLocator::new();
        locator.show("mirror", Rect::new(100, 100, 540, 1240), Rect::at_origin(540, 1200));
        locator.fail_client_to_screen(true);

        let frame = render_frame(&locator, "mirror").unwrap();

        assert_eq!(frame.client_origin, Point::new(100, 140));
    }

    #[test]
    fn test_render_frame_falls_back_to_scrcpy_title() {
        let locator = MockSurfaceLocator::new();
        locator.show("scrcpy", Rect::new(0, 0, 100, 200), Rect::at_origin(100, 200));

        let frame = render_frame(&locator, "my window").unwrap();

        assert_eq!(frame.client_width, 100);
        assert_eq!(locator.queries(), vec!["my window".to_string(), "scrcpy".to_string()]);
    }

    #[test]
    fn test_render_frame_reports_missing_surface() {
        let locator = MockSurfaceLocator::new();
        assert_eq!(
            render_frame(&locator, "mirror"),
            Err(SurfaceError::NotFound("mirror".to_string()))
        );
    }

    #[test]
    fn test_frame_hit_test_includes_title_bar() {
        let locator = MockSurfaceLocator::new();
        locator.show("mirror", Rect::new(300, 20, 800, 1230), Rect::at_origin(800, 1200));
        let frame = render_frame(&locator, "mirror").unwrap();

        assert!(frame.contains(Point::new(310, 25)));
        assert!(!frame.client_area().contains(Point::new(310, 25)));
        assert!(!frame.contains(Point::new(299, 600)));
    }

    #[test]
    fn test_static_locator_places_title_bar_above_client_area() {
        let locator = StaticSurfaceLocator::new(Rect::new(300, 50, 800, 1200), 30);

        let frame = render_frame(&locator, "anything").unwrap();

        assert_eq!(frame.client_area(), Rect::new(300, 50, 800, 1200));
        assert_eq!(frame.bounds, Rect::new(300, 20, 800, 1230));
    }
}
