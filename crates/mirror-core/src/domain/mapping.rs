//! Coordinate mapping between rectangles and device screens.
//!
//! The same transform serves two purposes:
//!
//! - mirroring-window client area (screen pixels) → master device coordinates,
//! - master device coordinates → slave device coordinates, where the source
//!   rectangle is the master's geometry at origin (0, 0).
//!
//! # Letterboxing (for beginners)
//!
//! A mirroring window keeps the phone's aspect ratio.  When the window is
//! wider than the phone, black bars appear left and right; when it is taller,
//! bars appear above and below.  A click on a bar corresponds to no device
//! pixel, so [`map_point`] returns `None` for it and the caller drops the input.
//!
//! ```text
//!   source rect (window client area)
//!  ┌────┬──────────────┬────┐
//!  │bar │ visible rect │bar │   visible rect = dest scaled uniformly by
//!  │    │  (device)    │    │   min(src.w / dest.w, src.h / dest.h), centred
//!  └────┴──────────────┴────┘
//! ```

use serde::{Deserialize, Serialize};

use super::geometry::ScreenGeometry;

/// Aspect ratios closer than this are treated as equal (no letterboxing).
pub const ASPECT_EPSILON: f64 = 0.01;

/// A pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Largest absolute per-axis distance to `other`.
    pub fn max_axis_delta(&self, other: &Point) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        dx.max(dy).min(u64::from(u32::MAX)) as u32
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle with its top-left corner at (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle anchored at (0, 0).
    pub const fn at_origin(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Returns the rightmost X coordinate (exclusive).
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Returns the bottommost Y coordinate (exclusive).
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Returns `true` when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if `p` lies inside the rectangle (right/bottom exclusive).
    pub fn contains(&self, p: Point) -> bool {
        let (x, y) = (i64::from(p.x), i64::from(p.y));
        x >= i64::from(self.x) && x < self.right() && y >= i64::from(self.y) && y < self.bottom()
    }

    /// Width divided by height, or `None` for an empty rectangle.
    pub fn aspect(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }
}

/// How slave coordinates are derived from master coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Uniform scale with letterbox exclusion ([`map_point`]).
    #[default]
    Letterbox,
    /// Independent X/Y scaling, never rejects a point ([`map_point_stretched`]).
    Stretch,
}

/// Offsets and extent of the visible sub-rectangle, relative to the source.
struct Fit {
    off_x: f64,
    off_y: f64,
    visible_w: f64,
    visible_h: f64,
}

fn aspects_differ(a: f64, b: f64) -> bool {
    (a - b).abs() > ASPECT_EPSILON
}

/// Computes where `dest` is drawn inside a `sw`×`sh` source.
///
/// The axis that the content fills keeps offset 0 and the full source length
/// exactly, so points on that axis never fall outside due to float error.
fn fit(sw: f64, sh: f64, dw: f64, dh: f64) -> Fit {
    let (src_aspect, dest_aspect) = (sw / sh, dw / dh);
    if !aspects_differ(src_aspect, dest_aspect) {
        return Fit { off_x: 0.0, off_y: 0.0, visible_w: sw, visible_h: sh };
    }
    if src_aspect > dest_aspect {
        // Source is wider: vertical bars on both sides.
        let visible_w = dw * (sh / dh);
        Fit { off_x: (sw - visible_w) / 2.0, off_y: 0.0, visible_w, visible_h: sh }
    } else {
        // Source is taller: horizontal bars above and below.
        let visible_h = dh * (sw / dw);
        Fit { off_x: 0.0, off_y: (sh - visible_h) / 2.0, visible_w: sw, visible_h }
    }
}

fn relative(p: Point, source: &Rect) -> (f64, f64) {
    let rel_x = (i64::from(p.x) - i64::from(source.x)) as f64;
    let rel_y = (i64::from(p.y) - i64::from(source.y)) as f64;
    (
        rel_x.clamp(0.0, f64::from(source.width)),
        rel_y.clamp(0.0, f64::from(source.height)),
    )
}

fn clamp_to(dest: &ScreenGeometry, x: f64, y: f64) -> Point {
    let max_x = i64::from(dest.width) - 1;
    let max_y = i64::from(dest.height) - 1;
    Point {
        x: (x.floor() as i64).clamp(0, max_x) as i32,
        y: (y.floor() as i64).clamp(0, max_y) as i32,
    }
}

/// Maps `p` from `source` into `dest` device coordinates.
///
/// `p` is expressed in the same coordinate space as `source`'s origin.  Points
/// outside `source` are clamped onto its edge, never rejected.  When the
/// aspect ratios differ by more than [`ASPECT_EPSILON`], `source` is assumed
/// to letterbox `dest`; a point in the bars yields `None`.
///
/// Returns `None` as well when `source` is empty or `dest` is unresolved,
/// meaning "mapping unavailable".
pub fn map_point(p: Point, source: &Rect, dest: &ScreenGeometry) -> Option<Point> {
    if source.is_empty() || !dest.is_valid() {
        return None;
    }
    let (sw, sh) = (f64::from(source.width), f64::from(source.height));
    let (dw, dh) = (f64::from(dest.width), f64::from(dest.height));
    let (rel_x, rel_y) = relative(p, source);

    let f = fit(sw, sh, dw, dh);
    if rel_x < f.off_x
        || rel_x > f.off_x + f.visible_w
        || rel_y < f.off_y
        || rel_y > f.off_y + f.visible_h
    {
        return None;
    }

    let dest_x = (rel_x - f.off_x) * dw / f.visible_w;
    let dest_y = (rel_y - f.off_y) * dh / f.visible_h;
    Some(clamp_to(dest, dest_x, dest_y))
}

/// Maps `p` by scaling X and Y independently, ignoring aspect ratio.
///
/// Returns `None` only when `source` is empty or `dest` is unresolved.
pub fn map_point_stretched(p: Point, source: &Rect, dest: &ScreenGeometry) -> Option<Point> {
    if source.is_empty() || !dest.is_valid() {
        return None;
    }
    let (rel_x, rel_y) = relative(p, source);
    let dest_x = rel_x * f64::from(dest.width) / f64::from(source.width);
    let dest_y = rel_y * f64::from(dest.height) / f64::from(source.height);
    Some(clamp_to(dest, dest_x, dest_y))
}

/// Maps `p` with the transform selected by `mode`.
pub fn map_point_with(
    mode: MappingMode,
    p: Point,
    source: &Rect,
    dest: &ScreenGeometry,
) -> Option<Point> {
    match mode {
        MappingMode::Letterbox => map_point(p, source, dest),
        MappingMode::Stretch => map_point_stretched(p, source, dest),
    }
}

/// Returns the part of `source` that actually shows `dest`, in `source`'s
/// coordinate space (rounded to whole pixels).
pub fn visible_rect(source: &Rect, dest: &ScreenGeometry) -> Option<Rect> {
    if source.is_empty() || !dest.is_valid() {
        return None;
    }
    let f = fit(
        f64::from(source.width),
        f64::from(source.height),
        f64::from(dest.width),
        f64::from(dest.height),
    );
    Some(Rect {
        x: source.x + f.off_x.round() as i32,
        y: source.y + f.off_y.round() as i32,
        width: f.visible_w.round() as u32,
        height: f.visible_h.round() as u32,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
