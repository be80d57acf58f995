//! GPU records for the flattened BVH and its primitives.
//!
//! Layouts match the traversal shader's std430 structs: every `vec3` is
//! followed by a 4-byte scalar or padding so nothing straddles 16 bytes.

use bytemuck::{Pod, Zeroable};

use super::build::{BvhLimits, FlatBvh};
use super::primitive::Primitive;
use crate::upload::FixedArray;
use crate::util::Result;

/// Child/primitive sentinel for "none".
pub const NO_INDEX: i32 = -1;

/// GPU BVH node (48 bytes).
///
/// Internal node: both children >= 0, `primitive_index` = -1
/// Leaf node: both children = -1, `primitive_index` = original primitive index
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuBvhNode {
    pub aabb_min: [f32; 3],
    pub left_child: i32,
    pub aabb_max: [f32; 3],
    pub right_child: i32,
    pub primitive_index: i32,
    pub _pad: [u32; 3],
}

impl GpuBvhNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left_child == NO_INDEX && self.right_child == NO_INDEX
    }

    pub fn bounds(&self) -> super::Aabb {
        super::Aabb::new(self.aabb_min.into(), self.aabb_max.into())
    }
}

/// Triangle for GPU storage (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub p0: [f32; 3],
    pub _pad0: u32,
    pub p1: [f32; 3],
    pub _pad1: u32,
    pub p2: [f32; 3],
    pub _pad2: u32,
}

/// Sphere for GPU storage (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub material_type: u32,
    pub _pad: [u32; 3],
}

/// Scene payloads ready for upload: node array and primitive array, each
/// sized to its fixed capacity.
pub struct GpuSceneData<T: Pod> {
    pub nodes: FixedArray<GpuBvhNode>,
    /// Primitives in original index order (leaves index into this).
    pub primitives: FixedArray<T>,
}

impl<T: Pod> GpuSceneData<T> {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Nothing to traverse; callers skip the sampling dispatch.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pack a built tree and its primitives into fixed-capacity payloads.
pub fn build_gpu_data<P: Primitive>(
    bvh: &FlatBvh,
    primitives: &[P],
    limits: &BvhLimits,
) -> Result<GpuSceneData<P::Gpu>> {
    let gpu_prims: Vec<P::Gpu> = primitives.iter().map(|p| p.to_gpu()).collect();

    Ok(GpuSceneData {
        nodes: FixedArray::new("BVH node", bvh.nodes().to_vec(), limits.max_nodes)?,
        primitives: FixedArray::new("primitive", gpu_prims, limits.max_primitives)?,
    })
}
