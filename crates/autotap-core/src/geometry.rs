//! Geometric value types in frame pixel space.
//!
//! All coordinates are 0-based with the origin at the top-left corner of the
//! frame. Positions are signed so that rectangles can be expanded past the
//! frame edge before being clamped; sizes are unsigned and never negative.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Saturating conversion from `u32` to `i32`.
#[inline]
fn saturating_i32(val: u32) -> i32 {
    val.min(i32::MAX as u32) as i32
}

/// A point in frame pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by the given offsets.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle: top-left position plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from its top-left and bottom-right corners.
    ///
    /// Inverted corners yield an empty rectangle rather than a negative size.
    #[must_use]
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let width = x2.saturating_sub(x1).max(0) as u32;
        let height = y2.saturating_sub(y1).max(0) as u32;
        Self::new(x1, y1, width, height)
    }

    #[must_use]
    pub fn from_parts(position: Point, size: Size) -> Self {
        Self::new(position.x, position.y, size.width, size.height)
    }

    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(saturating_i32(self.width))
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(saturating_i32(self.height))
    }

    /// `(x + width, y + height)`.
    #[must_use]
    pub fn right_bottom(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    /// Center point, rounding toward the top-left.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(saturating_i32(self.width / 2)),
            self.y.saturating_add(saturating_i32(self.height / 2)),
        )
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `point` lies inside the rectangle (right/bottom edges exclusive).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlapping area of two rectangles, or `None` if they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        let rect = Rect::from_corners(x1, y1, x2, y2);
        (!rect.is_empty()).then_some(rect)
    }

    /// Clamp to a frame of the given size.
    #[must_use]
    pub fn clamp_to(&self, bounds: Size) -> Option<Rect> {
        self.intersect(&Rect::new(0, 0, bounds.width, bounds.height))
    }

    /// Grow the rectangle in each direction.
    ///
    /// Negative amounts shrink it; the size saturates at zero.
    #[must_use]
    pub fn expand(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect::from_corners(
            self.x.saturating_sub(left),
            self.y.saturating_sub(top),
            self.right().saturating_add(right),
            self.bottom().saturating_add(bottom),
        )
    }

    #[must_use]
    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Smallest rectangle enclosing all points.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x1 = x1.min(p.x);
            y1 = y1.min(p.y);
            x2 = x2.max(p.x);
            y2 = y2.max(p.y);
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}x{}]", self.x, self.y, self.width, self.height)
    }
}

impl From<(i32, i32, u32, u32)> for Rect {
    fn from((x, y, width, height): (i32, i32, u32, u32)) -> Self {
        Rect::new(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_bottom_is_exclusive_corner() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.right_bottom(), Point::new(40, 60));
        assert_eq!(rect.center(), Point::new(25, 40));
    }

    #[test]
    fn from_corners_never_goes_negative() {
        let rect = Rect::from_corners(50, 50, 10, 10);
        assert!(rect.is_empty());
        assert_eq!(rect.width, 0);
        assert_eq!(rect.height, 0);
    }

    #[test]
    fn expand_grows_each_side() {
        let rect = Rect::new(100, 100, 20, 20).expand(0, 35, 35, 0);
        assert_eq!(rect, Rect::new(100, 65, 55, 55));
    }

    #[test]
    fn expand_past_origin_then_clamp() {
        let rect = Rect::new(5, 5, 10, 10).expand(10, 10, 0, 0);
        assert_eq!(rect.position(), Point::new(-5, -5));
        let clamped = rect.clamp_to(Size::new(100, 100)).unwrap();
        assert_eq!(clamped, Rect::new(0, 0, 15, 15));
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 5, 5);
        assert!(a.intersect(&b).is_none());
        assert_eq!(
            a.intersect(&Rect::new(5, 5, 10, 10)),
            Some(Rect::new(5, 5, 5, 5))
        );
    }

    #[test]
    fn contains_uses_exclusive_edges() {
        let rect = Rect::new(0, 0, 10, 10);
        assert!(rect.contains(Point::new(9, 9)));
        assert!(!rect.contains(Point::new(10, 9)));
        assert!(rect.contains_rect(&Rect::new(2, 2, 8, 8)));
        assert!(!rect.contains_rect(&Rect::new(2, 2, 9, 8)));
    }

    #[test]
    fn bounding_box_of_quad() {
        let quad = [
            Point::new(12, 10),
            Point::new(40, 11),
            Point::new(41, 22),
            Point::new(11, 21),
        ];
        assert_eq!(Rect::bounding(&quad), Some(Rect::new(11, 10, 30, 12)));
        assert_eq!(Rect::bounding(&[]), None);
    }
}
