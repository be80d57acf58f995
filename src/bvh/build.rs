//! Median-split BVH builder.
//!
//! Builds a binary tree over primitive boxes with an explicit work list and
//! flattens it into an index-addressed node array for GPU traversal.
//! Every leaf holds exactly one primitive, so N primitives produce 2N-1 nodes.

use rayon::prelude::*;

use super::aabb::{bounding_box_of, Aabb};
use super::gpu_data::{GpuBvhNode, NO_INDEX};
use super::primitive::{Primitive, PrimitiveRef};
use super::split::AxisChooser;
use crate::util::{Error, RenderConfig, Result};

/// Default padding applied to every primitive box.
pub const DEFAULT_BOX_EPSILON: f32 = 1e-4;

/// Capacities of the fixed-size GPU arrays the tree is uploaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvhLimits {
    pub max_primitives: usize,
    pub max_nodes: usize,
}

impl Default for BvhLimits {
    fn default() -> Self {
        Self {
            max_primitives: 500,
            max_nodes: 1024,
        }
    }
}

impl BvhLimits {
    /// Fail fast if `primitive_count` primitives (and their 2N-1 nodes)
    /// cannot fit.
    pub fn check(&self, primitive_count: usize) -> Result<()> {
        if primitive_count > self.max_primitives {
            return Err(Error::CapacityExceeded {
                what: "primitive",
                count: primitive_count,
                capacity: self.max_primitives,
            });
        }
        let node_count = node_count_for(primitive_count);
        // Node indices are i32 on the device
        let capacity = self.max_nodes.min(i32::MAX as usize);
        if node_count > capacity {
            return Err(Error::CapacityExceeded {
                what: "BVH node",
                count: node_count,
                capacity,
            });
        }
        Ok(())
    }
}

/// Node count of a tree with one primitive per leaf.
#[inline]
pub fn node_count_for(primitive_count: usize) -> usize {
    primitive_count.saturating_mul(2).saturating_sub(1)
}

/// Pending work: a primitive subset and the array slot it will occupy.
struct BuildItem {
    index: i32,
    refs: Vec<PrimitiveRef>,
}

/// Finished node before flattening.
struct BuildNode {
    bounds: Aabb,
    index: i32,
    left: i32,
    right: i32,
    primitive_index: i32,
}

impl BuildNode {
    fn to_gpu(&self) -> GpuBvhNode {
        let (aabb_min, aabb_max) = self.bounds.to_arrays();
        GpuBvhNode {
            aabb_min,
            left_child: self.left,
            aabb_max,
            right_child: self.right,
            primitive_index: self.primitive_index,
            _pad: [0; 3],
        }
    }
}

/// Builds flattened BVHs under fixed capacity limits.
#[derive(Debug, Clone, Copy)]
pub struct BvhBuilder {
    limits: BvhLimits,
    epsilon: f32,
}

impl BvhBuilder {
    pub fn new(limits: BvhLimits) -> Self {
        Self {
            limits,
            epsilon: DEFAULT_BOX_EPSILON,
        }
    }

    /// Padding added to every primitive box.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn limits(&self) -> &BvhLimits {
        &self.limits
    }

    /// Build with the limits, epsilon and split policy from `config`.
    pub fn build_with_config<P: Primitive>(
        primitives: &[P],
        config: &RenderConfig,
    ) -> Result<FlatBvh> {
        let mut chooser = config.split_axis.chooser(config.split_seed);
        Self::new(config.limits())
            .with_epsilon(config.box_epsilon)
            .build(primitives, chooser.as_mut())
    }

    /// Build a flattened BVH over `primitives`.
    ///
    /// Node 0 is the root. Children are always stored after their parent.
    /// An empty input yields an empty tree.
    #[tracing::instrument(skip_all, fields(prim_count = primitives.len()))]
    pub fn build<P, C>(&self, primitives: &[P], chooser: &mut C) -> Result<FlatBvh>
    where
        P: Primitive,
        C: AxisChooser + ?Sized,
    {
        self.limits.check(primitives.len())?;
        if primitives.is_empty() {
            return Ok(FlatBvh::default());
        }

        let epsilon = self.epsilon;
        let refs: Vec<PrimitiveRef> = primitives
            .par_iter()
            .enumerate()
            .map(|(i, p)| PrimitiveRef {
                original_index: i as u32,
                bounds: p.bounds(epsilon),
            })
            .collect();

        let node_count = node_count_for(primitives.len());
        let mut built: Vec<BuildNode> = Vec::with_capacity(node_count);
        let mut work = vec![BuildItem { index: 0, refs }];
        let mut next_index: i32 = 1;

        while let Some(mut item) = work.pop() {
            let bounds = bounding_box_of(item.refs.iter().map(|r| &r.bounds));

            let axis = chooser.choose_axis(&bounds);
            // Stable: equal keys keep their current order
            item.refs
                .sort_by(|a, b| a.bounds.axis_min(axis).total_cmp(&b.bounds.axis_min(axis)));

            if item.refs.len() <= 1 {
                built.push(BuildNode {
                    bounds,
                    index: item.index,
                    left: NO_INDEX,
                    right: NO_INDEX,
                    primitive_index: item
                        .refs
                        .first()
                        .map_or(NO_INDEX, |r| r.original_index as i32),
                });
                continue;
            }

            let mid = item.refs.len() / 2;
            let right_refs = item.refs.split_off(mid);

            let left = next_index;
            let right = next_index + 1;
            next_index += 2;

            work.push(BuildItem {
                index: left,
                refs: item.refs,
            });
            work.push(BuildItem {
                index: right,
                refs: right_refs,
            });

            built.push(BuildNode {
                bounds,
                index: item.index,
                left,
                right,
                primitive_index: NO_INDEX,
            });
        }

        // Processing order differs from index order; restore node i at slot i
        built.sort_unstable_by_key(|n| n.index);
        debug_assert_eq!(built.len(), node_count);

        let nodes: Vec<GpuBvhNode> = built.iter().map(BuildNode::to_gpu).collect();
        tracing::debug!(nodes = nodes.len(), "BVH built");

        Ok(FlatBvh { nodes })
    }
}

/// Summary counts of a flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BvhStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub internal_count: usize,
    /// Root-only tree has depth 1, empty tree 0.
    pub max_depth: usize,
}

/// Flattened BVH, node 0 = root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatBvh {
    nodes: Vec<GpuBvhNode>,
}

impl FlatBvh {
    pub fn nodes(&self) -> &[GpuBvhNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<GpuBvhNode> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&GpuBvhNode> {
        self.nodes.first()
    }

    /// Original primitive indices in node order (the leaf remap).
    pub fn leaf_order(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.primitive_index as u32)
            .collect()
    }

    pub fn stats(&self) -> BvhStats {
        let leaf_count = self.nodes.iter().filter(|n| n.is_leaf()).count();
        let mut max_depth = 0;
        let mut stack = Vec::new();
        if !self.nodes.is_empty() {
            stack.push((0usize, 1usize));
        }
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[idx];
            if !node.is_leaf() {
                stack.push((node.left_child as usize, depth + 1));
                stack.push((node.right_child as usize, depth + 1));
            }
        }
        BvhStats {
            node_count: self.nodes.len(),
            leaf_count,
            internal_count: self.nodes.len() - leaf_count,
            max_depth,
        }
    }

    /// Check the structural invariants of a tree built over
    /// `primitive_count` primitives.
    pub fn validate(&self, primitive_count: usize) -> Result<()> {
        let n = self.nodes.len();
        if n != node_count_for(primitive_count) {
            return Err(Error::invalid_tree(format!(
                "{} nodes for {} primitives",
                n, primitive_count
            )));
        }

        let mut seen_prim = vec![false; primitive_count];
        let mut referenced = vec![false; n];

        for (i, node) in self.nodes.iter().enumerate() {
            match (node.left_child, node.right_child) {
                (NO_INDEX, NO_INDEX) => {
                    let p = node.primitive_index;
                    if p < 0 || p as usize >= primitive_count {
                        return Err(Error::invalid_tree(format!(
                            "leaf {} has primitive index {}",
                            i, p
                        )));
                    }
                    if std::mem::replace(&mut seen_prim[p as usize], true) {
                        return Err(Error::invalid_tree(format!(
                            "primitive {} appears in more than one leaf",
                            p
                        )));
                    }
                }
                (l, r) if l >= 0 && r >= 0 => {
                    for child in [l, r] {
                        let c = child as usize;
                        if c >= n || c <= i {
                            return Err(Error::invalid_tree(format!(
                                "node {} has child {} outside ({}, {})",
                                i, c, i, n
                            )));
                        }
                        if std::mem::replace(&mut referenced[c], true) {
                            return Err(Error::invalid_tree(format!(
                                "node {} is referenced twice",
                                c
                            )));
                        }
                        if !node.bounds().contains(&self.nodes[c].bounds()) {
                            return Err(Error::invalid_tree(format!(
                                "node {} does not contain child {}",
                                i, c
                            )));
                        }
                    }
                }
                (l, r) => {
                    return Err(Error::invalid_tree(format!(
                        "node {} has a single child ({}, {})",
                        i, l, r
                    )));
                }
            }
        }

        if let Some(p) = seen_prim.iter().position(|s| !s) {
            return Err(Error::invalid_tree(format!("primitive {} not in any leaf", p)));
        }
        Ok(())
    }
}
