//! 2D vector and axis-aligned rectangle primitives used throughout the
//! simulation (movement, collision, terrain queries, combat ranges).

use std::ops::{Add, Div, Mul, Sub};

/// A 2D point or displacement in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }

    /// Returns a unit vector in the same direction, or `Vec2::ZERO` if this
    /// vector has (near) zero length.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len < 1e-9 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Angle in radians, measured from the positive x-axis.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn from_angle(angle: f64) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

/// An axis-aligned rectangle, stored as a center point and full size
/// (width, height). Buildings are always square (`size.x == size.y`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub center: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Rect { center, size }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.center.x - self.size.x / 2.0, self.center.y - self.size.y / 2.0)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.center.x + self.size.x / 2.0, self.center.y + self.size.y / 2.0)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        let (amin, amax) = (self.min(), self.max());
        let (bmin, bmax) = (other.min(), other.max());
        amin.x < bmax.x && amax.x > bmin.x && amin.y < bmax.y && amax.y > bmin.y
    }

    /// Area of overlap with `other`, 0 if disjoint.
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let (amin, amax) = (self.min(), self.max());
        let (bmin, bmax) = (other.min(), other.max());
        let overlap_x = (amax.x.min(bmax.x) - amin.x.max(bmin.x)).max(0.0);
        let overlap_y = (amax.y.min(bmax.y) - amin.y.max(bmin.y)).max(0.0);
        overlap_x * overlap_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_normalized_handles_zero_length() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn vec2_distance_matches_pythagoras() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn rect_intersects_detects_overlap_and_separation() {
        let a = Rect::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Rect::new(Vec2::new(5.0, 0.0), Vec2::new(10.0, 10.0));
        let c = Rect::new(Vec2::new(100.0, 0.0), Vec2::new(10.0, 10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn rect_overlap_area_is_zero_when_disjoint() {
        let a = Rect::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = Rect::new(Vec2::new(10.0, 10.0), Vec2::new(2.0, 2.0));
        assert_eq!(a.overlap_area(&b), 0.0);
    }
}
