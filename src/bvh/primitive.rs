//! Scene primitives the builder can partition.
//!
//! A primitive only has to report its bounding box and its GPU record; the
//! builder never looks at the geometry again after the boxes are taken.

use bytemuck::Pod;
use glam::Vec3;

use super::aabb::Aabb;
use super::gpu_data::{GpuSphere, GpuTriangle};

/// Geometry that can be placed in the BVH and uploaded to the device.
pub trait Primitive: Sync {
    /// GPU record uploaded in original index order.
    type Gpu: Pod;

    /// Bounding box padded by `epsilon` on every axis.
    fn bounds(&self, epsilon: f32) -> Aabb;

    fn to_gpu(&self) -> Self::Gpu;
}

/// Triangle given by three points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
}

impl Triangle {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self { p0, p1, p2 }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.p0 + self.p1 + self.p2) / 3.0
    }
}

impl Primitive for Triangle {
    type Gpu = GpuTriangle;

    fn bounds(&self, epsilon: f32) -> Aabb {
        Aabb::from_points(&[self.p0, self.p1, self.p2], epsilon)
    }

    fn to_gpu(&self) -> GpuTriangle {
        GpuTriangle {
            p0: self.p0.to_array(),
            _pad0: 0,
            p1: self.p1.to_array(),
            _pad1: 0,
            p2: self.p2.to_array(),
            _pad2: 0,
        }
    }
}

/// Sphere with a material tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub material_type: u32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material_type: u32) -> Self {
        Self {
            center,
            radius,
            material_type,
        }
    }
}

impl Primitive for Sphere {
    type Gpu = GpuSphere;

    fn bounds(&self, epsilon: f32) -> Aabb {
        let r = Vec3::splat(self.radius.abs());
        Aabb::new(self.center - r, self.center + r).padded(epsilon)
    }

    fn to_gpu(&self) -> GpuSphere {
        GpuSphere {
            center: self.center.to_array(),
            radius: self.radius,
            material_type: self.material_type,
            _pad: [0; 3],
        }
    }
}

/// Builder working-set entry: stable index into the primitive buffer plus
/// the box taken from the primitive's geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveRef {
    pub original_index: u32,
    pub bounds: Aabb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_bounds_padded() {
        let t = Triangle::new(
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(4.0, 0.0, 2.0),
            Vec3::new(0.0, 3.0, 2.0),
        );
        let b = t.bounds(0.01);
        assert!((b.min.z - 1.99).abs() < 1e-6);
        assert!((b.max.z - 2.01).abs() < 1e-6);
        assert!((b.max.x - 4.01).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_bounds() {
        let s = Sphere::new(Vec3::new(1.0, 1.0, 1.0), 0.5, 3);
        let b = s.bounds(0.0);
        assert_eq!(b.min, Vec3::splat(0.5));
        assert_eq!(b.max, Vec3::splat(1.5));
        assert_eq!(s.to_gpu().material_type, 3);
    }

    #[test]
    fn test_triangle_to_gpu() {
        let t = Triangle::new(Vec3::X, Vec3::Y, Vec3::Z);
        let g = t.to_gpu();
        assert_eq!(g.p0, [1.0, 0.0, 0.0]);
        assert_eq!(g.p2, [0.0, 0.0, 1.0]);
        assert!((t.centroid() - Vec3::splat(1.0 / 3.0)).length() < 1e-6);
    }
}
