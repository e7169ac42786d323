//! Integer pixel geometry shared by inters and systems.
//!
//! Edge and offset arithmetic saturates at the `i32` range instead of
//! wrapping.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in sheet pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle containing both; empty operands are ignored.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rectangle::new(
            x,
            y,
            self.right().max(other.right()).saturating_sub(x),
            self.bottom().max(other.bottom()).saturating_sub(y),
        )
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rectangle {
        Rectangle::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Rectangle;

    #[test]
    fn union_ignores_empty_rectangles() {
        let a = Rectangle::new(10, 10, 5, 5);
        assert_eq!(a.union(&Rectangle::default()), a);
        assert_eq!(Rectangle::default().union(&a), a);
        assert_eq!(
            a.union(&Rectangle::new(0, 12, 2, 10)),
            Rectangle::new(0, 10, 15, 12)
        );
    }

    #[test]
    fn intersects_is_exclusive_on_edges() {
        let a = Rectangle::new(0, 0, 10, 10);
        assert!(a.intersects(&Rectangle::new(9, 9, 3, 3)));
        assert!(!a.intersects(&Rectangle::new(10, 0, 3, 3)));
        assert!(a.contains_point(0, 0));
        assert!(!a.contains_point(10, 5));
    }

    #[test]
    fn edges_saturate_near_coordinate_limits() {
        let far = Rectangle::new(i32::MAX - 5, i32::MIN + 5, 10, 10);
        assert_eq!(far.right(), i32::MAX);
        assert_eq!(far.bottom(), i32::MIN + 15);
        assert!(far.contains_point(i32::MAX - 1, i32::MIN + 5));

        let moved = far.translated(100, -100);
        assert_eq!((moved.x, moved.y), (i32::MAX, i32::MIN));
        assert_eq!(moved.right(), i32::MAX);

        let wide = Rectangle::new(-10, 0, 5, 5).union(&far);
        assert_eq!(wide.x, -10);
        assert_eq!(wide.width, i32::MAX);
    }
}
