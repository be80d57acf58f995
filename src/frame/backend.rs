//! Collaborator interfaces the orchestrator drives.
//!
//! Device creation, window-system glue and pipeline objects live outside
//! this crate; the orchestrator only needs the operations below. Handles are
//! `Copy` so command targets can be given to render passes by value.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::util::Result;

/// Queue a submission is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Compute,
    Graphics,
}

/// Which queue the compute pass is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueRouting {
    /// Compute work on the compute queue, graphics work on the graphics queue.
    #[default]
    Split,
    /// Everything on the graphics-capable queue.
    Unified,
}

impl QueueRouting {
    pub fn queue_for(self, pass: PassKind) -> QueueKind {
        match (self, pass) {
            (QueueRouting::Split, PassKind::Compute) => QueueKind::Compute,
            _ => QueueKind::Graphics,
        }
    }
}

/// The two recorded passes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Ray sampling compute pass
    Compute,
    /// Forward/graphics passes
    Graphics,
}

/// Pipeline stage a semaphore wait applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    TopOfPipe,
    ComputeShader,
    ColorAttachmentOutput,
    Transfer,
}

/// Semaphore to wait on before `stage` runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemaphoreWait<S> {
    pub semaphore: S,
    pub stage: PipelineStage,
}

/// Synchronization attached to one queue submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitInfo<S, F> {
    pub waits: SmallVec<[SemaphoreWait<S>; 2]>,
    pub signals: SmallVec<[S; 2]>,
    pub fence: Option<F>,
}

/// Status reported by image acquisition and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Success,
    /// Usable, but no longer matches the surface exactly
    Suboptimal,
    /// Unusable; the image set must be rebuilt
    OutOfDate,
    /// Anything else; carries the backend's raw code
    Failed(i32),
}

/// Surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area surface.
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format and color space of a presentation image set, as raw
/// backend codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: u32,
    pub color_space: u32,
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format {} / color space {}", self.format, self.color_space)
    }
}

/// A presentation image set. Dropping the last handle releases it.
pub trait Swapchain {
    fn format(&self) -> SurfaceFormat;
    fn extent(&self) -> Extent2d;
    fn image_count(&self) -> usize;
}

/// Device, queues and presentation engine.
pub trait Backend {
    type Semaphore: Copy + PartialEq + fmt::Debug;
    type Fence: Copy + PartialEq + fmt::Debug;
    type CommandBuffer: Copy + PartialEq + fmt::Debug;
    type Swapchain: Swapchain;

    fn create_semaphore(&mut self) -> Result<Self::Semaphore>;
    fn create_fence(&mut self, signaled: bool) -> Result<Self::Fence>;
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);
    fn destroy_fence(&mut self, fence: Self::Fence);

    /// Block until `fence` is signaled.
    fn wait_for_fence(&mut self, fence: Self::Fence) -> Result<()>;
    fn reset_fence(&mut self, fence: Self::Fence) -> Result<()>;
    /// Block until every queue is idle.
    fn wait_idle(&mut self) -> Result<()>;

    fn allocate_command_buffer(&mut self) -> Result<Self::CommandBuffer>;
    fn free_command_buffer(&mut self, command_buffer: Self::CommandBuffer);
    /// Begin recording, discarding anything previously recorded.
    fn begin_commands(&mut self, command_buffer: Self::CommandBuffer) -> Result<()>;
    fn end_commands(&mut self, command_buffer: Self::CommandBuffer) -> Result<()>;
    fn submit(
        &mut self,
        queue: QueueKind,
        command_buffers: &[Self::CommandBuffer],
        info: &SubmitInfo<Self::Semaphore, Self::Fence>,
    ) -> Result<()>;

    /// Build an image set for `extent`, reusing `previous` where possible.
    fn create_swapchain(
        &mut self,
        extent: Extent2d,
        previous: Option<&Self::Swapchain>,
    ) -> Result<Self::Swapchain>;

    /// Request the next image; `signal` fires when it is actually available.
    fn acquire_next_image(
        &mut self,
        swapchain: &Self::Swapchain,
        signal: Self::Semaphore,
    ) -> Result<(u32, SurfaceStatus)>;

    fn present(
        &mut self,
        swapchain: &Self::Swapchain,
        image_index: u32,
        waits: &[Self::Semaphore],
    ) -> Result<SurfaceStatus>;
}

/// Window-system collaborator.
pub trait Window {
    fn extent(&self) -> Extent2d;
    /// Block until the platform delivers events.
    fn wait_events(&mut self);
    fn was_resized(&self) -> bool;
    fn reset_resized(&mut self);
}

/// Descriptor pool holding per-image descriptor sets.
pub trait DescriptorPool {
    fn reset(&mut self) -> Result<()>;
}
