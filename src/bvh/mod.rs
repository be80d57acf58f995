//! Spatial structure builder.
//!
//! Builds a binary BVH over scene primitives on the CPU and flattens it into
//! an index-addressed node array the sampling shader can traverse without
//! pointers.
//!
//! ## Architecture
//! ```text
//! Primitives → boxes (rayon) → work-list median split → sort by index → GpuBvhNode[]
//!                                                                    → FixedArray → upload
//! ```

pub mod aabb;
pub mod build;
pub mod gpu_data;
pub mod primitive;
pub mod split;

pub use aabb::{bounding_box_of, Aabb, Axis};
pub use build::{node_count_for, BvhBuilder, BvhLimits, BvhStats, FlatBvh, DEFAULT_BOX_EPSILON};
pub use gpu_data::{build_gpu_data, GpuBvhNode, GpuSceneData, GpuSphere, GpuTriangle, NO_INDEX};
pub use primitive::{Primitive, PrimitiveRef, Sphere, Triangle};
pub use split::{AxisChooser, AxisSequence, LongestExtent, RandomAxis, SplitAxis};
