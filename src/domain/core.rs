//! Core domain types and operations
//!
//! Pixel geometry shared by the layout model, the gesture interpreter and the
//! renderer. Nothing here knows about cameras, trackers or the OS.

/// A point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in display pixel coordinates
///
/// Key rectangles are treated as closed regions: a point lying exactly on
/// any of the four edges belongs to the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Creates a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns the right edge coordinate
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Returns the bottom edge coordinate
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Returns true if the point lies inside or on the border of this rectangle
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Returns true if the point lies strictly inside this rectangle
    pub fn strictly_contains(&self, px: i32, py: i32) -> bool {
        px > self.x && px < self.right() && py > self.y && py < self.bottom()
    }

    /// Returns true if the two closed rectangles share at least one point
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Returns the bounding box that contains both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::new(left, top, right - left, bottom - top)
    }

    /// Returns the center of the rectangle, rounded toward the top-left
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }
}
