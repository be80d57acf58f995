//! Frames-in-flight scheduling.
//!
//! Each frame walks `Idle -> Acquiring -> CommandRecording ->
//! ComputeSubmitted -> GraphicsSubmitted -> Presented -> Idle`. Calls made
//! out of order are rejected with [`Error::FrameState`] before any device
//! work happens.
//!
//! Synchronization per slot `s`:
//! - acquisition signals `image_available[s]`
//! - compute waits on it, signals `compute_finished[s]`, carries no fence
//! - graphics waits on `compute_finished[s]`, signals `graphics_finished[s]`
//!   and `in_flight[s]`
//! - presentation waits on `graphics_finished[s]`
//!
//! `in_flight[s]` is reset right before the compute submission, so the next
//! wait on slot `s` returns once the graphics pass of this frame is done.

use bytemuck::{Pod, Zeroable};
use smallvec::smallvec;

use super::backend::{
    Backend, DescriptorPool, Extent2d, PassKind, PipelineStage, QueueKind, QueueRouting,
    SemaphoreWait, SubmitInfo, SurfaceStatus, Window,
};
use super::slot::FrameSlot;
use super::surface::{SurfaceHandle, SurfaceState};
use crate::util::{Error, RenderConfig, Result};

/// Where the current frame is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    Acquiring,
    CommandRecording,
    ComputeSubmitted,
    GraphicsSubmitted,
    Presented,
}

impl FrameStage {
    pub fn name(self) -> &'static str {
        match self {
            FrameStage::Idle => "Idle",
            FrameStage::Acquiring => "Acquiring",
            FrameStage::CommandRecording => "CommandRecording",
            FrameStage::ComputeSubmitted => "ComputeSubmitted",
            FrameStage::GraphicsSubmitted => "GraphicsSubmitted",
            FrameStage::Presented => "Presented",
        }
    }
}

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The frame was dropped or presented onto a stale surface, which has
    /// now been rebuilt.
    SurfaceRecreated,
}

/// Values a render pass needs while recording the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub slot: usize,
    pub image_index: u32,
    pub random_seed: u32,
    pub epoch: u64,
    pub extent: Extent2d,
}

impl FrameInfo {
    pub fn push_constants(&self) -> SamplingPushConstants {
        SamplingPushConstants {
            random_seed: self.random_seed,
        }
    }
}

/// Push-constant block of the sampling pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SamplingPushConstants {
    pub random_seed: u32,
}

/// Records the two passes of a frame into the provided command targets.
pub trait FramePasses<B: Backend> {
    fn record_compute(
        &mut self,
        backend: &mut B,
        commands: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> Result<()>;

    fn record_graphics(
        &mut self,
        backend: &mut B,
        commands: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> Result<()>;
}

/// Keeps up to `F` frames in flight against a presentation surface.
pub struct FrameOrchestrator<B: Backend, W: Window> {
    backend: B,
    window: W,
    descriptor_pool: Option<Box<dyn DescriptorPool>>,
    slots: Vec<FrameSlot<B>>,
    surface: SurfaceState<B::Swapchain>,
    routing: QueueRouting,
    current_slot: usize,
    image_index: u32,
    stage: FrameStage,
    random_seed: u32,
    frames_presented: u64,
}

impl<B: Backend, W: Window> FrameOrchestrator<B, W> {
    /// Create the surface and one slot per frame in flight.
    pub fn new(backend: B, window: W, config: &RenderConfig) -> Result<Self> {
        Self::with_options(backend, window, config.frames_in_flight, config.queue_routing)
    }

    #[tracing::instrument(skip(backend, window))]
    pub fn with_options(
        mut backend: B,
        mut window: W,
        frames_in_flight: usize,
        routing: QueueRouting,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::config("frames_in_flight must be at least 1"));
        }

        let surface = SurfaceState::create(&mut backend, &mut window)?;

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match FrameSlot::create(&mut backend) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots.drain(..) {
                        slot.destroy(&mut backend);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            backend,
            window,
            descriptor_pool: None,
            slots,
            surface,
            routing,
            current_slot: 0,
            image_index: 0,
            stage: FrameStage::Idle,
            random_seed: 0,
            frames_presented: 0,
        })
    }

    /// Pool reset whenever the surface is rebuilt.
    pub fn set_descriptor_pool(&mut self, pool: Box<dyn DescriptorPool>) {
        self.descriptor_pool = Some(pool);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Frames presented on the current surface generation.
    pub fn random_seed(&self) -> u32 {
        self.random_seed
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn routing(&self) -> QueueRouting {
        self.routing
    }

    pub fn epoch(&self) -> u64 {
        self.surface.epoch()
    }

    pub fn surface(&self) -> SurfaceHandle<B::Swapchain> {
        self.surface.handle()
    }

    /// True while `handle` still refers to the live image set.
    pub fn is_current(&self, handle: &SurfaceHandle<B::Swapchain>) -> bool {
        handle.epoch() == self.surface.epoch()
    }

    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            slot: self.current_slot,
            image_index: self.image_index,
            random_seed: self.random_seed,
            epoch: self.surface.epoch(),
            extent: self.surface.extent(),
        }
    }

    fn expect_stage(&self, allowed: &[FrameStage], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(Error::FrameState {
                expected,
                actual: self.stage.name(),
            })
        }
    }

    /// Wait for the current slot, then acquire the next image.
    ///
    /// Returns `None` when the surface was out of date; it has been rebuilt
    /// and the caller should start the frame over.
    pub fn acquire_frame(&mut self) -> Result<Option<FrameInfo>> {
        self.expect_stage(&[FrameStage::Idle], "Idle")?;
        self.stage = FrameStage::Acquiring;

        let slot = &self.slots[self.current_slot];
        let (image_available, in_flight) = (slot.image_available, slot.in_flight);

        let acquired = self
            .backend
            .wait_for_fence(in_flight)
            .and_then(|_| {
                self.backend
                    .acquire_next_image(self.surface.swapchain(), image_available)
            });
        let (image_index, status) = match acquired {
            Ok(v) => v,
            Err(e) => {
                self.stage = FrameStage::Idle;
                return Err(e);
            }
        };

        match status {
            SurfaceStatus::Success | SurfaceStatus::Suboptimal => {}
            SurfaceStatus::OutOfDate => {
                self.stage = FrameStage::Idle;
                tracing::debug!(slot = self.current_slot, "acquire reported out of date");
                self.rebuild_surface()?;
                return Ok(None);
            }
            SurfaceStatus::Failed(code) => {
                self.stage = FrameStage::Idle;
                return Err(Error::Presentation {
                    operation: "acquire",
                    code,
                });
            }
        }

        self.image_index = image_index;
        self.stage = FrameStage::CommandRecording;
        let info = self.frame_info();
        tracing::trace!(
            slot = info.slot,
            image = info.image_index,
            seed = info.random_seed,
            "frame acquired"
        );
        Ok(Some(info))
    }

    /// Stages in which the command target for `pass` may be recorded.
    /// The compute target is locked once it has been submitted.
    fn expect_recordable(&self, pass: PassKind) -> Result<()> {
        match pass {
            PassKind::Compute => {
                self.expect_stage(&[FrameStage::CommandRecording], "CommandRecording")
            }
            PassKind::Graphics => self.expect_stage(
                &[FrameStage::CommandRecording, FrameStage::ComputeSubmitted],
                "CommandRecording",
            ),
        }
    }

    /// Reset and begin the current slot's command target for `pass`.
    pub fn begin_commands(&mut self, pass: PassKind) -> Result<B::CommandBuffer> {
        self.expect_recordable(pass)?;
        let commands = self.slots[self.current_slot].commands(pass);
        self.backend.begin_commands(commands)?;
        Ok(commands)
    }

    pub fn end_commands(&mut self, pass: PassKind) -> Result<()> {
        self.expect_recordable(pass)?;
        let commands = self.slots[self.current_slot].commands(pass);
        self.backend.end_commands(commands)
    }

    /// Drop the frame being recorded and return to `Idle`.
    ///
    /// Only possible before the compute submission: the slot fence has not
    /// been reset yet, so the next acquisition on this slot does not block.
    pub fn abort_frame(&mut self) -> Result<()> {
        self.expect_stage(&[FrameStage::CommandRecording], "CommandRecording")?;
        tracing::debug!(slot = self.current_slot, "frame aborted during recording");
        self.stage = FrameStage::Idle;
        Ok(())
    }

    /// Submit the slot's own compute target.
    pub fn submit_compute_commands(&mut self) -> Result<()> {
        let commands = self.slots[self.current_slot].compute_commands;
        self.submit_compute(&[commands])
    }

    /// Submit compute work for the current frame.
    ///
    /// Resets the slot's fence; the submission itself carries no fence.
    pub fn submit_compute(&mut self, command_buffers: &[B::CommandBuffer]) -> Result<()> {
        self.expect_stage(&[FrameStage::CommandRecording], "CommandRecording")?;
        let slot = &self.slots[self.current_slot];
        let info = SubmitInfo {
            waits: smallvec![SemaphoreWait {
                semaphore: slot.image_available,
                stage: PipelineStage::ColorAttachmentOutput,
            }],
            signals: smallvec![slot.compute_finished],
            fence: None,
        };
        let in_flight = slot.in_flight;
        let queue = self.routing.queue_for(PassKind::Compute);

        self.backend.reset_fence(in_flight)?;
        self.backend
            .submit(queue, command_buffers, &info)
            .map_err(|e| Error::Submit(format!("compute submission failed: {}", e)))?;

        self.stage = FrameStage::ComputeSubmitted;
        Ok(())
    }

    /// Submit the slot's own graphics target.
    pub fn submit_graphics_commands(&mut self) -> Result<()> {
        let commands = self.slots[self.current_slot].graphics_commands;
        self.submit_graphics(&[commands])
    }

    /// Submit graphics work; signals the slot's fence on completion.
    pub fn submit_graphics(&mut self, command_buffers: &[B::CommandBuffer]) -> Result<()> {
        self.expect_stage(&[FrameStage::ComputeSubmitted], "ComputeSubmitted")?;
        let slot = &self.slots[self.current_slot];
        let info = SubmitInfo {
            waits: smallvec![SemaphoreWait {
                semaphore: slot.compute_finished,
                stage: PipelineStage::ColorAttachmentOutput,
            }],
            signals: smallvec![slot.graphics_finished],
            fence: Some(slot.in_flight),
        };

        self.backend
            .submit(QueueKind::Graphics, command_buffers, &info)
            .map_err(|e| Error::Submit(format!("graphics submission failed: {}", e)))?;

        self.stage = FrameStage::GraphicsSubmitted;
        Ok(())
    }

    /// Present the current image and advance to the next slot.
    pub fn present_frame(&mut self) -> Result<FrameOutcome> {
        self.expect_stage(&[FrameStage::GraphicsSubmitted], "GraphicsSubmitted")?;

        let wait = [self.slots[self.current_slot].graphics_finished];
        let presented = self
            .backend
            .present(self.surface.swapchain(), self.image_index, &wait);

        self.current_slot = (self.current_slot + 1) % self.slots.len();
        self.stage = FrameStage::Idle;
        let status = presented?;

        let stale = matches!(status, SurfaceStatus::OutOfDate | SurfaceStatus::Suboptimal);
        if stale || self.window.was_resized() {
            self.window.reset_resized();
            tracing::debug!(?status, "surface stale after present");
            self.rebuild_surface()?;
            return Ok(FrameOutcome::SurfaceRecreated);
        }
        if let SurfaceStatus::Failed(code) = status {
            return Err(Error::Presentation {
                operation: "present",
                code,
            });
        }

        self.random_seed = self.random_seed.wrapping_add(1);
        self.frames_presented += 1;
        Ok(FrameOutcome::Presented)
    }

    /// Run one full frame: acquire, record both passes, submit, present.
    pub fn render_frame<P: FramePasses<B>>(&mut self, passes: &mut P) -> Result<FrameOutcome> {
        let Some(info) = self.acquire_frame()? else {
            return Ok(FrameOutcome::SurfaceRecreated);
        };

        if let Err(e) = self.record_passes(passes, &info) {
            self.abort_frame()?;
            return Err(e);
        }

        self.submit_compute_commands()?;
        self.submit_graphics_commands()?;
        self.present_frame()
    }

    fn record_passes<P: FramePasses<B>>(
        &mut self,
        passes: &mut P,
        info: &FrameInfo,
    ) -> Result<()> {
        let commands = self.begin_commands(PassKind::Compute)?;
        passes.record_compute(&mut self.backend, commands, info)?;
        self.end_commands(PassKind::Compute)?;

        let commands = self.begin_commands(PassKind::Graphics)?;
        passes.record_graphics(&mut self.backend, commands, info)?;
        self.end_commands(PassKind::Graphics)
    }

    /// Rebuild the surface and restart accumulation. Slots are kept.
    fn rebuild_surface(&mut self) -> Result<()> {
        self.surface.recreate(&mut self.backend, &mut self.window)?;
        if let Some(pool) = self.descriptor_pool.as_mut() {
            pool.reset()?;
        }
        self.random_seed = 0;
        Ok(())
    }
}

impl<B: Backend, W: Window> Drop for FrameOrchestrator<B, W> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            tracing::warn!("wait for idle failed during teardown: {}", e);
        }
        if let Some(pool) = self.descriptor_pool.as_mut() {
            if let Err(e) = pool.reset() {
                tracing::warn!("descriptor pool reset failed during teardown: {}", e);
            }
        }
        for slot in self.slots.drain(..) {
            slot.destroy(&mut self.backend);
        }
    }
}
