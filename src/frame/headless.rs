//! Headless backend for simulation and tests.
//!
//! Queues complete instantly: a submission that carries a fence signals it
//! immediately. Waiting on an unsignaled fence that nothing will signal is
//! reported as an error instead of hanging. Every call is appended to a
//! shared event log, and acquire/present statuses can be scripted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{
    Backend, DescriptorPool, Extent2d, PipelineStage, QueueKind, SubmitInfo, SurfaceFormat,
    SurfaceStatus, Swapchain, Window,
};
use crate::util::{Error, Result};

/// `VK_FORMAT_B8G8R8A8_SRGB` / `VK_COLOR_SPACE_SRGB_NONLINEAR_KHR`
pub const DEFAULT_SURFACE_FORMAT: SurfaceFormat = SurfaceFormat {
    format: 50,
    color_space: 0,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessEvent {
    CreateSemaphore(u32),
    CreateFence { fence: u32, signaled: bool },
    DestroySemaphore(u32),
    DestroyFence(u32),
    WaitFence(u32),
    ResetFence(u32),
    WaitIdle,
    AllocateCommands(u32),
    FreeCommands(u32),
    BeginCommands(u32),
    EndCommands(u32),
    Submit {
        queue: QueueKind,
        command_buffers: Vec<u32>,
        waits: Vec<(u32, PipelineStage)>,
        signals: Vec<u32>,
        fence: Option<u32>,
    },
    CreateSwapchain {
        swapchain: u32,
        extent: Extent2d,
        previous: Option<u32>,
    },
    Acquire {
        swapchain: u32,
        semaphore: u32,
        image_index: u32,
        status: SurfaceStatus,
    },
    Present {
        swapchain: u32,
        image_index: u32,
        waits: Vec<u32>,
        status: SurfaceStatus,
    },
    ResetDescriptorPool,
}

pub type EventLog = Arc<Mutex<Vec<HeadlessEvent>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSwapchain {
    pub id: u32,
    extent: Extent2d,
    format: SurfaceFormat,
    image_count: usize,
}

impl Swapchain for HeadlessSwapchain {
    fn format(&self) -> SurfaceFormat {
        self.format
    }

    fn extent(&self) -> Extent2d {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.image_count
    }
}

pub struct HeadlessBackend {
    log: EventLog,
    next_id: u32,
    fences: HashMap<u32, bool>,
    image_count: usize,
    next_image: u32,
    format: SurfaceFormat,
    format_script: VecDeque<SurfaceFormat>,
    fail_next_fence: bool,
    acquire_script: VecDeque<SurfaceStatus>,
    present_script: VecDeque<SurfaceStatus>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            next_id: 1,
            fences: HashMap::new(),
            image_count: 3,
            next_image: 0,
            format: DEFAULT_SURFACE_FORMAT,
            format_script: VecDeque::new(),
            fail_next_fence: false,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
        }
    }

    pub fn with_image_count(mut self, count: usize) -> Self {
        self.image_count = count.max(1);
        self
    }

    /// Shared handle to the event log.
    pub fn log(&self) -> EventLog {
        Arc::clone(&self.log)
    }

    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<HeadlessEvent> {
        self.log.lock().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().clear();
    }

    /// Status returned by the next acquisition. Unscripted calls succeed.
    pub fn queue_acquire_status(&mut self, status: SurfaceStatus) {
        self.acquire_script.push_back(status);
    }

    /// Status returned by the next presentation. Unscripted calls succeed.
    pub fn queue_present_status(&mut self, status: SurfaceStatus) {
        self.present_script.push_back(status);
    }

    /// Format of the next image set created.
    pub fn queue_swapchain_format(&mut self, format: SurfaceFormat) {
        self.format_script.push_back(format);
    }

    /// Make the next fence creation fail.
    pub fn fail_next_fence(&mut self) {
        self.fail_next_fence = true;
    }

    /// Descriptor pool that records its resets into this backend's log.
    pub fn descriptor_pool(&self) -> HeadlessDescriptorPool {
        HeadlessDescriptorPool { log: self.log() }
    }

    pub fn is_fence_signaled(&self, fence: u32) -> Option<bool> {
        self.fences.get(&fence).copied()
    }

    fn record(&self, event: HeadlessEvent) {
        self.log.lock().push(event);
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Backend for HeadlessBackend {
    type Semaphore = u32;
    type Fence = u32;
    type CommandBuffer = u32;
    type Swapchain = HeadlessSwapchain;

    fn create_semaphore(&mut self) -> Result<u32> {
        let id = self.alloc_id();
        self.record(HeadlessEvent::CreateSemaphore(id));
        Ok(id)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<u32> {
        if std::mem::take(&mut self.fail_next_fence) {
            return Err(Error::SyncObject("fence allocation failed".into()));
        }
        let id = self.alloc_id();
        self.fences.insert(id, signaled);
        self.record(HeadlessEvent::CreateFence { fence: id, signaled });
        Ok(id)
    }

    fn destroy_semaphore(&mut self, semaphore: u32) {
        self.record(HeadlessEvent::DestroySemaphore(semaphore));
    }

    fn destroy_fence(&mut self, fence: u32) {
        self.fences.remove(&fence);
        self.record(HeadlessEvent::DestroyFence(fence));
    }

    fn wait_for_fence(&mut self, fence: u32) -> Result<()> {
        self.record(HeadlessEvent::WaitFence(fence));
        match self.fences.get(&fence) {
            Some(true) => Ok(()),
            Some(false) => Err(Error::SyncObject(format!(
                "fence {} is unsignaled with no pending submission",
                fence
            ))),
            None => Err(Error::SyncObject(format!("unknown fence {}", fence))),
        }
    }

    fn reset_fence(&mut self, fence: u32) -> Result<()> {
        self.record(HeadlessEvent::ResetFence(fence));
        match self.fences.get_mut(&fence) {
            Some(state) => {
                *state = false;
                Ok(())
            }
            None => Err(Error::SyncObject(format!("unknown fence {}", fence))),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.record(HeadlessEvent::WaitIdle);
        Ok(())
    }

    fn allocate_command_buffer(&mut self) -> Result<u32> {
        let id = self.alloc_id();
        self.record(HeadlessEvent::AllocateCommands(id));
        Ok(id)
    }

    fn free_command_buffer(&mut self, command_buffer: u32) {
        self.record(HeadlessEvent::FreeCommands(command_buffer));
    }

    fn begin_commands(&mut self, command_buffer: u32) -> Result<()> {
        self.record(HeadlessEvent::BeginCommands(command_buffer));
        Ok(())
    }

    fn end_commands(&mut self, command_buffer: u32) -> Result<()> {
        self.record(HeadlessEvent::EndCommands(command_buffer));
        Ok(())
    }

    fn submit(
        &mut self,
        queue: QueueKind,
        command_buffers: &[u32],
        info: &SubmitInfo<u32, u32>,
    ) -> Result<()> {
        if let Some(fence) = info.fence {
            match self.fences.get_mut(&fence) {
                Some(state) => *state = true,
                None => return Err(Error::SyncObject(format!("unknown fence {}", fence))),
            }
        }
        self.record(HeadlessEvent::Submit {
            queue,
            command_buffers: command_buffers.to_vec(),
            waits: info.waits.iter().map(|w| (w.semaphore, w.stage)).collect(),
            signals: info.signals.to_vec(),
            fence: info.fence,
        });
        Ok(())
    }

    fn create_swapchain(
        &mut self,
        extent: Extent2d,
        previous: Option<&HeadlessSwapchain>,
    ) -> Result<HeadlessSwapchain> {
        if let Some(format) = self.format_script.pop_front() {
            self.format = format;
        }
        let id = self.alloc_id();
        self.next_image = 0;
        self.record(HeadlessEvent::CreateSwapchain {
            swapchain: id,
            extent,
            previous: previous.map(|p| p.id),
        });
        Ok(HeadlessSwapchain {
            id,
            extent,
            format: self.format,
            image_count: self.image_count,
        })
    }

    fn acquire_next_image(
        &mut self,
        swapchain: &HeadlessSwapchain,
        signal: u32,
    ) -> Result<(u32, SurfaceStatus)> {
        let status = self.acquire_script.pop_front().unwrap_or(SurfaceStatus::Success);
        let image_index = self.next_image;
        if matches!(status, SurfaceStatus::Success | SurfaceStatus::Suboptimal) {
            self.next_image = (self.next_image + 1) % swapchain.image_count as u32;
        }
        self.record(HeadlessEvent::Acquire {
            swapchain: swapchain.id,
            semaphore: signal,
            image_index,
            status,
        });
        Ok((image_index, status))
    }

    fn present(
        &mut self,
        swapchain: &HeadlessSwapchain,
        image_index: u32,
        waits: &[u32],
    ) -> Result<SurfaceStatus> {
        let status = self.present_script.pop_front().unwrap_or(SurfaceStatus::Success);
        self.record(HeadlessEvent::Present {
            swapchain: swapchain.id,
            image_index,
            waits: waits.to_vec(),
            status,
        });
        Ok(status)
    }
}

/// Window whose size changes only when told to.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    extent: Extent2d,
    pending: VecDeque<Extent2d>,
    resized: bool,
    event_waits: usize,
}

impl HeadlessWindow {
    pub fn new(extent: Extent2d) -> Self {
        Self {
            extent,
            pending: VecDeque::new(),
            resized: false,
            event_waits: 0,
        }
    }

    /// Resize immediately and raise the resized flag.
    pub fn resize(&mut self, extent: Extent2d) {
        self.extent = extent;
        self.resized = true;
    }

    /// Extent delivered by a later `wait_events` call.
    pub fn queue_extent(&mut self, extent: Extent2d) {
        self.pending.push_back(extent);
    }

    /// Number of times the orchestrator blocked on events.
    pub fn event_waits(&self) -> usize {
        self.event_waits
    }
}

impl Window for HeadlessWindow {
    fn extent(&self) -> Extent2d {
        self.extent
    }

    fn wait_events(&mut self) {
        self.event_waits += 1;
        match self.pending.pop_front() {
            Some(extent) => self.resize(extent),
            // Nothing left to deliver: restore a drawable surface
            None if self.extent.is_zero_area() => self.resize(Extent2d::new(1, 1)),
            None => {}
        }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized(&mut self) {
        self.resized = false;
    }
}

/// Descriptor pool that only records resets.
pub struct HeadlessDescriptorPool {
    log: EventLog,
}

impl DescriptorPool for HeadlessDescriptorPool {
    fn reset(&mut self) -> Result<()> {
        self.log.lock().push(HeadlessEvent::ResetDescriptorPool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_fence_signaled_by_submission() {
        let mut backend = HeadlessBackend::new();
        let fence = backend.create_fence(false).unwrap();
        assert!(backend.wait_for_fence(fence).is_err());

        let info = SubmitInfo {
            waits: smallvec![],
            signals: smallvec![],
            fence: Some(fence),
        };
        backend.submit(QueueKind::Graphics, &[], &info).unwrap();
        assert_eq!(backend.is_fence_signaled(fence), Some(true));
        backend.wait_for_fence(fence).unwrap();
    }

    #[test]
    fn test_scripted_statuses() {
        let mut backend = HeadlessBackend::new().with_image_count(2);
        let chain = backend.create_swapchain(Extent2d::new(8, 8), None).unwrap();
        let sem = backend.create_semaphore().unwrap();
        backend.queue_acquire_status(SurfaceStatus::OutOfDate);

        assert_eq!(
            backend.acquire_next_image(&chain, sem).unwrap(),
            (0, SurfaceStatus::OutOfDate)
        );
        assert_eq!(
            backend.acquire_next_image(&chain, sem).unwrap(),
            (0, SurfaceStatus::Success)
        );
        assert_eq!(
            backend.acquire_next_image(&chain, sem).unwrap(),
            (1, SurfaceStatus::Success)
        );
        assert_eq!(
            backend.acquire_next_image(&chain, sem).unwrap(),
            (0, SurfaceStatus::Success)
        );
    }

    #[test]
    fn test_window_events() {
        let mut window = HeadlessWindow::new(Extent2d::new(0, 0));
        window.queue_extent(Extent2d::new(0, 10));
        window.wait_events();
        assert!(window.extent().is_zero_area());
        window.wait_events();
        assert_eq!(window.extent(), Extent2d::new(1, 1));
        assert!(window.was_resized());
        assert_eq!(window.event_waits(), 2);
    }
}
