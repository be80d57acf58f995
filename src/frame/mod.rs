//! Frame orchestration for a hybrid compute + graphics renderer.
//!
//! Keeps up to `F` frames in flight, sequencing image acquisition, a compute
//! (ray sampling) submission, a graphics submission and presentation with
//! per-slot semaphores and fences. Rebuilds the presentation surface when it
//! goes stale and exposes a per-frame random seed that restarts at zero
//! whenever that happens.
//!
//! The device, window and descriptor pool are reached through the traits in
//! [`backend`]; [`headless`] provides an in-process implementation.
//!
//! ## Usage
//! ```ignore
//! let mut frames = FrameOrchestrator::new(backend, window, &config)?;
//! loop {
//!     frames.render_frame(&mut passes)?;
//! }
//! ```

pub mod backend;
pub mod headless;
mod orchestrator;
mod slot;
mod surface;

pub use backend::{
    Backend, DescriptorPool, Extent2d, PassKind, PipelineStage, QueueKind, QueueRouting,
    SemaphoreWait, SubmitInfo, SurfaceFormat, SurfaceStatus, Swapchain, Window,
};
pub use orchestrator::{
    FrameInfo, FrameOrchestrator, FrameOutcome, FramePasses, FrameStage, SamplingPushConstants,
};
pub use slot::FrameSlot;
pub use surface::{SurfaceHandle, SurfaceState};
