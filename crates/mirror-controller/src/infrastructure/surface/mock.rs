//! Mock surface locator for unit testing.

use std::sync::{Arc, Mutex};

use mirror_core::{Point, Rect};

use super::{SurfaceError, SurfaceHandle, SurfaceLocator};

#[derive(Debug, Clone)]
struct Window {
    title: String,
    bounds: Rect,
    client: Rect,
}

#[derive(Debug, Default)]
struct State {
    window: Option<Window>,
    fail_client_to_screen: bool,
    queries: Vec<String>,
}

/// A mock [`SurfaceLocator`] holding at most one window.
///
/// The client area is assumed to occupy the bottom of the bounding rect.
#[derive(Debug, Clone, Default)]
pub struct MockSurfaceLocator {
    state: Arc<Mutex<State>>,
}

impl MockSurfaceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows (or moves) the window.
    pub fn show(&self, title: &str, bounds: Rect, client: Rect) {
        self.lock().window = Some(Window { title: title.to_string(), bounds, client });
    }

    /// Closes the window.
    pub fn hide(&self) {
        self.lock().window = None;
    }

    pub fn fail_client_to_screen(&self, fail: bool) {
        self.lock().fail_client_to_screen = fail;
    }

    /// Title substrings passed to `find_surface`, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("lock poisoned")
    }

    fn window(&self) -> Result<Window, SurfaceError> {
        self.lock().window.clone().ok_or_else(|| SurfaceError::Query("window closed".to_string()))
    }
}

impl SurfaceLocator for MockSurfaceLocator {
    fn find_surface(&self, title_substring: &str) -> Option<SurfaceHandle> {
        let mut state = self.lock();
        state.queries.push(title_substring.to_string());
        let window = state.window.as_ref()?;
        window
            .title
            .to_lowercase()
            .contains(&title_substring.to_lowercase())
            .then(|| SurfaceHandle { id: 1, title: window.title.clone() })
    }

    fn bounding_rect(&self, _surface: &SurfaceHandle) -> Result<Rect, SurfaceError> {
        Ok(self.window()?.bounds)
    }

    fn client_rect(&self, _surface: &SurfaceHandle) -> Result<Rect, SurfaceError> {
        let client = self.window()?.client;
        Ok(Rect::at_origin(client.width, client.height))
    }

    fn client_to_screen(&self, _surface: &SurfaceHandle, point: Point) -> Result<Point, SurfaceError> {
        if self.lock().fail_client_to_screen {
            return Err(SurfaceError::Query("conversion unavailable".to_string()));
        }
        let window = self.window()?;
        let title_bar = window.bounds.height.saturating_sub(window.client.height) as i32;
        Ok(Point::new(window.bounds.x + point.x, window.bounds.y + title_bar + point.y))
    }
}
