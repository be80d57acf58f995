//! # Hybrid Raytracer
//!
//! Host-side core of a hybrid compute + rasterization renderer.
//!
//! ## Modules
//!
//! - [`bvh`] - Bounding boxes, median-split hierarchy builder, GPU node layout
//! - [`upload`] - Fixed-capacity arrays and staged upload to device buffers
//! - [`frame`] - Frames-in-flight orchestration and surface lifecycle
//! - [`util`] - Errors and persistent configuration
//!
//! ## Example
//!
//! ```ignore
//! use hybrid_raytracer::prelude::*;
//!
//! let config = RenderConfig::load();
//! let bvh = BvhBuilder::build_with_config(&spheres, &config)?;
//! let data = build_gpu_data(&bvh, &spheres, &config.limits())?;
//! let buffers = upload_scene(&mut device, &data)?;
//!
//! let mut frames = FrameOrchestrator::new(backend, window, &config)?;
//! loop {
//!     frames.render_frame(&mut passes)?;
//! }
//! ```

pub mod util;
pub mod bvh;
pub mod upload;
pub mod frame;

// Re-export commonly used types
pub use bvh::{Aabb, BvhBuilder, BvhLimits, FlatBvh};
pub use frame::FrameOrchestrator;
pub use util::{Error, RenderConfig, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bvh::{
        build_gpu_data, Aabb, Axis, AxisChooser, BvhBuilder, BvhLimits, FlatBvh, GpuBvhNode,
        Primitive, Sphere, SplitAxis, Triangle,
    };
    pub use crate::frame::{
        Backend, Extent2d, FrameInfo, FrameOrchestrator, FrameOutcome, FramePasses,
        QueueRouting, SurfaceStatus, Window,
    };
    pub use crate::upload::{upload_scene, BufferDevice, FixedArray, SceneBuffers};
    pub use crate::util::{Error, RenderConfig, Result};
}
