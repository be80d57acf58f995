//! Axis-aligned bounding boxes.
//!
//! Every split decision the builder makes is driven by these boxes, so the
//! empty sentinel and the merge identity are load-bearing.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate axis used for split decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index (0=x, 1=y, 2=z).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis from a component index, wrapping modulo 3.
    #[inline]
    pub fn from_index(i: usize) -> Self {
        Self::ALL[i % 3]
    }
}

/// 3D axis-aligned bounding box with single precision.
#[derive(Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Empty bounding box (inverted, so any merge yields the other box).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight box around a set of points, padded by `epsilon` on every axis.
    pub fn from_points(points: &[Vec3], epsilon: f32) -> Self {
        let mut b = Self::EMPTY;
        for &p in points {
            b.grow_point(p);
        }
        b.padded(epsilon)
    }

    /// Check if this box is the empty sentinel (or otherwise inverted).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Component-wise union. `EMPTY` is the identity.
    #[inline]
    pub fn merge(a: &Aabb, b: &Aabb) -> Aabb {
        Aabb {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include another box.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        *self = Self::merge(self, other);
    }

    /// Box expanded by `epsilon` on every side. Empty stays empty.
    #[inline]
    pub fn padded(&self, epsilon: f32) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let pad = Vec3::splat(epsilon);
        Aabb {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size along each axis.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Minimum coordinate along an axis (the builder's sort key).
    #[inline]
    pub fn axis_min(&self, axis: Axis) -> f32 {
        self.min[axis.index()]
    }

    /// Longest axis; ties resolve toward X, then Y.
    #[inline]
    pub fn longest_axis(&self) -> Axis {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            Axis::X
        } else if e.y >= e.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Surface area. Zero for the empty box.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Whether `other` lies entirely inside this box.
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Min/max as plain arrays for GPU packing.
    #[inline]
    pub fn to_arrays(&self) -> ([f32; 3], [f32; 3]) {
        (self.min.to_array(), self.max.to_array())
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aabb({:?} - {:?})", self.min, self.max)
    }
}

/// Left fold of [`Aabb::merge`] over a set of boxes.
///
/// An empty iterator yields [`Aabb::EMPTY`], which callers must not treat
/// as a real box.
pub fn bounding_box_of<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Aabb {
    boxes
        .into_iter()
        .fold(Aabb::EMPTY, |acc, b| Aabb::merge(&acc, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::new(Vec3::new(x, y, z), Vec3::new(x + 1.0, y + 1.0, z + 1.0))
    }

    #[test]
    fn test_empty_is_merge_identity() {
        let b = unit_at(1.0, 2.0, 3.0);
        assert_eq!(Aabb::merge(&Aabb::EMPTY, &b), b);
        assert_eq!(Aabb::merge(&b, &Aabb::EMPTY), b);
        assert!(Aabb::EMPTY.is_empty());
        assert!(!b.is_empty());
    }

    #[test]
    fn test_merge_is_componentwise() {
        let a = unit_at(0.0, 0.0, 0.0);
        let b = unit_at(-2.0, 5.0, 0.5);
        let m = Aabb::merge(&a, &b);
        assert_eq!(m.min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(m.max, Vec3::new(1.0, 6.0, 1.5));
        assert!(m.contains(&a));
        assert!(m.contains(&b));
    }

    #[test]
    fn test_bounding_box_of_empty_set() {
        let boxes: Vec<Aabb> = Vec::new();
        assert!(bounding_box_of(&boxes).is_empty());
    }

    #[test]
    fn test_flat_points_get_volume() {
        // Triangle in the z=0 plane
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let b = Aabb::from_points(&pts, 1e-4);
        assert!(b.extent().z > 0.0);
        assert!((b.min.z + 1e-4).abs() < 1e-7);
        assert!((b.max.x - (1.0 + 1e-4)).abs() < 1e-6);
    }

    #[test]
    fn test_longest_axis() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(b.longest_axis(), Axis::Y);
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 5.0));
        assert_eq!(b.longest_axis(), Axis::Z);
        // Cube ties go to X
        assert_eq!(unit_at(0.0, 0.0, 0.0).longest_axis(), Axis::X);
    }

    #[test]
    fn test_area() {
        assert_eq!(unit_at(0.0, 0.0, 0.0).area(), 6.0);
        assert_eq!(Aabb::EMPTY.area(), 0.0);
    }
}
