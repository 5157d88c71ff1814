//! Device screen geometry and the strategy chain that recovers it.
//!
//! Android validates input coordinates against the *override* size (set by
//! `wm size WxH`) when one is active, not against the physical panel.  The
//! strategies below therefore try the override first, then the physical size,
//! then any `WxH` pair in the `wm size` output, and finally the window
//! manager's display dump.
//!
//! Every strategy is a pure `fn(&str) -> Option<ScreenGeometry>` so each one
//! can be tested against captured device output without a device attached.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::mapping::Rect;

/// Where a [`ScreenGeometry`] value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometrySource {
    /// `Override size:` line of `wm size`.
    Override,
    /// `Physical size:` line (or any `WxH` pair) of `wm size`.
    Physical,
    /// Parsed from `dumpsys window displays`.
    WindowManagerDump,
    /// No strategy succeeded.
    Unknown,
}

impl fmt::Display for GeometrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GeometrySource::Override => "override",
            GeometrySource::Physical => "physical",
            GeometrySource::WindowManagerDump => "dump",
            GeometrySource::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Error produced when constructing a geometry from raw dimensions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("screen dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
}

/// Logical input-coordinate space of a device.
///
/// A value with a zero dimension is "unresolved" and must never be used as
/// the source or destination of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub source: GeometrySource,
}

impl ScreenGeometry {
    /// The zero-geometry sentinel returned when resolution fails.
    pub const UNRESOLVED: ScreenGeometry = ScreenGeometry {
        width: 0,
        height: 0,
        source: GeometrySource::Unknown,
    };

    /// Creates a geometry without validating it.
    pub const fn new(width: u32, height: u32, source: GeometrySource) -> Self {
        Self { width, height, source }
    }

    /// Creates a geometry, rejecting zero dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroDimension`] if either dimension is zero.
    pub fn try_new(width: u32, height: u32, source: GeometrySource) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::ZeroDimension { width, height });
        }
        Ok(Self::new(width, height, source))
    }

    /// Returns `true` when both dimensions are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Width divided by height, or `None` when unresolved.
    pub fn aspect(&self) -> Option<f64> {
        self.as_rect().aspect()
    }

    /// The `(0, 0)`-origin rectangle covering the whole screen.
    pub fn as_rect(&self) -> Rect {
        Rect::at_origin(self.width, self.height)
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}x{} ({})", self.width, self.height, self.source)
        } else {
            f.write_str("unresolved")
        }
    }
}

// ── Strategy chain ────────────────────────────────────────────────────────────

/// Device query whose text output a strategy parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryQuery {
    WmSize,
    DisplayDump,
}

impl GeometryQuery {
    /// Shell command sent through the device bridge.
    pub fn command(&self) -> &'static str {
        match self {
            GeometryQuery::WmSize => "wm size",
            GeometryQuery::DisplayDump => "dumpsys window displays",
        }
    }
}

/// One step of the resolution priority chain.
#[derive(Debug, Clone, Copy)]
pub struct GeometryStrategy {
    pub name: &'static str,
    pub query: GeometryQuery,
    pub parse: fn(&str) -> Option<ScreenGeometry>,
}

/// Resolution strategies in priority order.  The first one that produces a
/// valid geometry wins.
pub const STRATEGIES: &[GeometryStrategy] = &[
    GeometryStrategy { name: "override", query: GeometryQuery::WmSize, parse: parse_override_size },
    GeometryStrategy { name: "physical", query: GeometryQuery::WmSize, parse: parse_physical_size },
    GeometryStrategy { name: "any-pair", query: GeometryQuery::WmSize, parse: parse_any_size_pair },
    GeometryStrategy { name: "dump", query: GeometryQuery::DisplayDump, parse: parse_display_dump },
];

struct CachedPatterns {
    override_size: Regex,
    physical_size: Regex,
    size_pair: Regex,
    display_width: Regex,
    display_height: Regex,
}

fn patterns() -> &'static CachedPatterns {
    static PATTERNS: OnceLock<CachedPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CachedPatterns {
        override_size: Regex::new(r"(?i)override size:\s*(\d+)\s*x\s*(\d+)").expect("valid regex"),
        physical_size: Regex::new(r"(?i)physical size:\s*(\d+)\s*x\s*(\d+)").expect("valid regex"),
        size_pair: Regex::new(r"(\d+)\s*x\s*(\d+)").expect("valid regex"),
        display_width: Regex::new(r"mDisplayWidth=(\d+)").expect("valid regex"),
        display_height: Regex::new(r"mDisplayHeight=(\d+)").expect("valid regex"),
    })
}

fn capture_pair(re: &Regex, text: &str, source: GeometrySource) -> Option<ScreenGeometry> {
    let caps = re.captures(text)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    accept(width, height, source)
}

/// Validates a parsed size, logging why a matched pair is discarded.
fn accept(width: u32, height: u32, source: GeometrySource) -> Option<ScreenGeometry> {
    match ScreenGeometry::try_new(width, height, source) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            debug!(%source, "discarding matched size {width}x{height}: {e}");
            None
        }
    }
}

fn capture_single(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parses the `Override size: WxH` line of `wm size`.
pub fn parse_override_size(output: &str) -> Option<ScreenGeometry> {
    capture_pair(&patterns().override_size, output, GeometrySource::Override)
}

/// Parses the `Physical size: WxH` line of `wm size`.
pub fn parse_physical_size(output: &str) -> Option<ScreenGeometry> {
    capture_pair(&patterns().physical_size, output, GeometrySource::Physical)
}

/// Accepts the first `WxH` pair anywhere in the `wm size` output.
pub fn parse_any_size_pair(output: &str) -> Option<ScreenGeometry> {
    capture_pair(&patterns().size_pair, output, GeometrySource::Physical)
}

/// Parses `dumpsys window displays`.
///
/// Prefers the `mDisplayWidth=` / `mDisplayHeight=` fields and falls back to
/// the first `WxH` pair (e.g. `init=1080x2400`).
pub fn parse_display_dump(output: &str) -> Option<ScreenGeometry> {
    let p = patterns();
    let fields = capture_single(&p.display_width, output)
        .zip(capture_single(&p.display_height, output))
        .and_then(|(w, h)| accept(w, h, GeometrySource::WindowManagerDump));
    fields.or_else(|| capture_pair(&p.size_pair, output, GeometrySource::WindowManagerDump))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const WM_SIZE_WITH_OVERRIDE: &str = "Physical size: 1440x3200\nOverride size: 1080x2400\n";
    const WM_SIZE_PHYSICAL_ONLY: &str = "Physical size: 720x1600\n";

    #[test]
    fn test_override_size_preferred_over_physical() {
        let g = parse_override_size(WM_SIZE_WITH_OVERRIDE).unwrap();
        assert_eq!((g.width, g.height, g.source), (1080, 2400, GeometrySource::Override));
    }

    #[test]
    fn test_override_size_absent_yields_none() {
        assert_eq!(parse_override_size(WM_SIZE_PHYSICAL_ONLY), None);
    }

    #[test]
    fn test_physical_size_is_case_insensitive() {
        let g = parse_physical_size("PHYSICAL SIZE: 720 x 1600").unwrap();
        assert_eq!((g.width, g.height), (720, 1600));
        assert_eq!(g.source, GeometrySource::Physical);
    }

    #[test]
    fn test_zero_dimension_is_discarded() {
        assert_eq!(parse_physical_size("Physical size: 0x1600"), None);
        assert_eq!(parse_override_size("Override size: 1080x0"), None);
    }

    #[test]
    fn test_any_pair_matches_unlabelled_output() {
        let g = parse_any_size_pair("size is 1200x1920").unwrap();
        assert_eq!((g.width, g.height), (1200, 1920));
    }

    #[test]
    fn test_overflowing_number_is_rejected() {
        assert_eq!(parse_any_size_pair("99999999999x100"), None);
    }

    #[test]
    fn test_display_dump_with_zero_fields_falls_back_to_size_pair() {
        let dump = "  mDisplayWidth=0 mDisplayHeight=0\n  init=1080x2400 420dpi\n";
        let g = parse_display_dump(dump).unwrap();
        assert_eq!((g.width, g.height), (1080, 2400));
    }

    #[test]
    fn test_display_dump_prefers_named_fields() {
        let dump = "Display: mDisplayId=0\n  init=1440x3200 560dpi\n  mDisplayWidth=1080 mDisplayHeight=2340\n";
        let g = parse_display_dump(dump).unwrap();
        assert_eq!((g.width, g.height), (1080, 2340));
        assert_eq!(g.source, GeometrySource::WindowManagerDump);
    }

    #[test]
    fn test_display_dump_falls_back_to_any_pair() {
        let g = parse_display_dump("Display: mDisplayId=0\n  init=1440x3200 560dpi").unwrap();
        assert_eq!((g.width, g.height), (1440, 3200));
    }

    #[test]
    fn test_display_dump_without_size_yields_none() {
        assert_eq!(parse_display_dump("no displays"), None);
    }

    #[test]
    fn test_strategies_are_ordered_override_physical_pair_dump() {
        let names: Vec<_> = STRATEGIES.iter().map(|s| s.name).collect();
        assert_eq!(names, ["override", "physical", "any-pair", "dump"]);
        assert_eq!(STRATEGIES[3].query, GeometryQuery::DisplayDump);
    }

    #[test]
    fn test_first_matching_strategy_wins() {
        let winner = STRATEGIES
            .iter()
            .filter(|s| s.query == GeometryQuery::WmSize)
            .find_map(|s| (s.parse)(WM_SIZE_WITH_OVERRIDE))
            .unwrap();
        assert_eq!(winner.source, GeometrySource::Override);
    }

    #[test]
    fn test_unresolved_sentinel_is_invalid() {
        assert!(!ScreenGeometry::UNRESOLVED.is_valid());
        assert_eq!(ScreenGeometry::UNRESOLVED.aspect(), None);
        assert_eq!(ScreenGeometry::UNRESOLVED.to_string(), "unresolved");
    }

    #[test]
    fn test_try_new_rejects_zero() {
        assert_eq!(
            ScreenGeometry::try_new(0, 10, GeometrySource::Physical),
            Err(GeometryError::ZeroDimension { width: 0, height: 10 })
        );
    }

    #[test]
    fn test_display_includes_source_label() {
        let g = ScreenGeometry::new(1080, 2400, GeometrySource::Override);
        assert_eq!(g.to_string(), "1080x2400 (override)");
    }
}
