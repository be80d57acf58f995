//! Frame protocol driven against the headless backend.

use hybrid_raytracer::frame::headless::{
    HeadlessBackend, HeadlessEvent, HeadlessWindow, DEFAULT_SURFACE_FORMAT,
};
use hybrid_raytracer::frame::{
    Backend, Extent2d, FrameInfo, FrameOrchestrator, FrameOutcome, FramePasses, FrameStage,
    PipelineStage, QueueKind, QueueRouting, SurfaceFormat, SurfaceStatus, Swapchain, Window,
};
use hybrid_raytracer::{Error, RenderConfig};

type Orchestrator = FrameOrchestrator<HeadlessBackend, HeadlessWindow>;

/// Records the frame info seen by each pass.
#[derive(Default)]
struct RecordingPasses {
    compute: Vec<FrameInfo>,
    graphics: Vec<FrameInfo>,
}

impl<B: Backend> FramePasses<B> for RecordingPasses {
    fn record_compute(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        self.compute.push(*frame);
        Ok(())
    }

    fn record_graphics(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        frame: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        self.graphics.push(*frame);
        Ok(())
    }
}

/// Fails while recording the chosen pass.
struct FailingPasses {
    fail_compute: bool,
}

impl<B: Backend> FramePasses<B> for FailingPasses {
    fn record_compute(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        _: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        if self.fail_compute {
            return Err(Error::other("compute pipeline missing"));
        }
        Ok(())
    }

    fn record_graphics(
        &mut self,
        _: &mut B,
        _: B::CommandBuffer,
        _: &FrameInfo,
    ) -> hybrid_raytracer::Result<()> {
        Err(Error::other("graphics pipeline missing"))
    }
}

fn orchestrator(frames: usize) -> Orchestrator {
    let config = RenderConfig {
        frames_in_flight: frames,
        width: 320,
        height: 240,
        ..Default::default()
    };
    FrameOrchestrator::new(
        HeadlessBackend::new(),
        HeadlessWindow::new(config.extent()),
        &config,
    )
    .unwrap()
}

fn created_fences(events: &[HeadlessEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            HeadlessEvent::CreateFence { fence, signaled } => {
                assert!(*signaled);
                Some(*fence)
            }
            _ => None,
        })
        .collect()
}

fn count(events: &[HeadlessEvent], pred: impl Fn(&HeadlessEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_slots_rotate_and_fences_waited_once_per_cycle() {
    let frames = 3;
    let mut orch = orchestrator(frames);
    let fences = created_fences(&orch.backend().events());
    assert_eq!(fences.len(), frames);

    let mut passes = RecordingPasses::default();
    for _ in 0..2 * frames {
        assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::Presented);
    }

    let slots: Vec<usize> = passes.compute.iter().map(|f| f.slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2]);
    assert_eq!(passes.graphics.len(), 2 * frames);

    let waits: Vec<u32> = orch
        .backend()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HeadlessEvent::WaitFence(f) => Some(f),
            _ => None,
        })
        .collect();
    let expected: Vec<u32> = fences.iter().chain(fences.iter()).copied().collect();
    assert_eq!(waits, expected);
}

#[test]
fn test_submission_chain_per_frame() {
    let mut orch = orchestrator(2);
    orch.render_frame(&mut RecordingPasses::default()).unwrap();
    let events = orch.backend().events();

    let acquired = events.iter().find_map(|e| match e {
        HeadlessEvent::Acquire { semaphore, .. } => Some(*semaphore),
        _ => None,
    });
    let waited_fence = events.iter().find_map(|e| match e {
        HeadlessEvent::WaitFence(f) => Some(*f),
        _ => None,
    });
    let submits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            HeadlessEvent::Submit {
                queue,
                waits,
                signals,
                fence,
                ..
            } => Some((*queue, waits.clone(), signals.clone(), *fence)),
            _ => None,
        })
        .collect();
    let present_waits = events.iter().find_map(|e| match e {
        HeadlessEvent::Present { waits, .. } => Some(waits.clone()),
        _ => None,
    });

    assert_eq!(submits.len(), 2);
    let (queue, waits, compute_signals, fence) = &submits[0];
    assert_eq!(*queue, QueueKind::Compute);
    assert_eq!(waits, &vec![(acquired.unwrap(), PipelineStage::ColorAttachmentOutput)]);
    assert_eq!(*fence, None);

    let (queue, waits, graphics_signals, fence) = &submits[1];
    assert_eq!(*queue, QueueKind::Graphics);
    assert_eq!(waits, &vec![(compute_signals[0], PipelineStage::ColorAttachmentOutput)]);
    assert_eq!(*fence, waited_fence);

    assert_eq!(present_waits.unwrap(), graphics_signals.clone());

    // Fence reset happens before the compute submission
    let reset_pos = events.iter().position(|e| matches!(e, HeadlessEvent::ResetFence(_)));
    let submit_pos = events.iter().position(|e| matches!(e, HeadlessEvent::Submit { .. }));
    assert!(reset_pos.unwrap() < submit_pos.unwrap());
}

#[test]
fn test_five_presents_give_seed_five() {
    let mut orch = orchestrator(2);
    let mut passes = RecordingPasses::default();
    for _ in 0..5 {
        orch.render_frame(&mut passes).unwrap();
    }
    assert_eq!(orch.random_seed(), 5);
    assert_eq!(orch.frames_presented(), 5);
    let seeds: Vec<u32> = passes.compute.iter().map(|f| f.random_seed).collect();
    assert_eq!(seeds, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_out_of_date_acquire_aborts_frame() {
    let mut orch = orchestrator(2);
    let mut passes = RecordingPasses::default();
    for _ in 0..3 {
        orch.render_frame(&mut passes).unwrap();
    }
    assert_eq!(orch.random_seed(), 3);
    let slot = orch.current_slot();
    let handle = orch.surface();
    let pool = orch.backend().descriptor_pool();
    orch.set_descriptor_pool(Box::new(pool));

    orch.backend_mut().queue_acquire_status(SurfaceStatus::OutOfDate);
    orch.backend().clear_events();
    assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::SurfaceRecreated);

    let events = orch.backend().events();
    assert_eq!(count(&events, |e| matches!(e, HeadlessEvent::Submit { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, HeadlessEvent::Present { .. })), 0);
    assert_eq!(count(&events, |e| *e == HeadlessEvent::ResetDescriptorPool), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        HeadlessEvent::CreateSwapchain { previous: Some(_), .. }
    )));
    assert_eq!(passes.compute.len(), 3);
    assert_eq!(orch.random_seed(), 0);
    assert_eq!(orch.current_slot(), slot);
    assert_eq!(orch.epoch(), 1);
    assert!(!orch.is_current(&handle));

    // Next frame proceeds on the same slot with a fresh seed
    assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::Presented);
    let last = passes.compute.last().unwrap();
    assert_eq!(last.slot, slot);
    assert_eq!(last.random_seed, 0);
    assert_eq!(last.epoch, 1);
}

#[test]
fn test_suboptimal_acquire_proceeds() {
    let mut orch = orchestrator(2);
    orch.backend_mut().queue_acquire_status(SurfaceStatus::Suboptimal);
    assert_eq!(
        orch.render_frame(&mut RecordingPasses::default()).unwrap(),
        FrameOutcome::Presented
    );
    assert_eq!(orch.epoch(), 0);
}

#[test]
fn test_failed_acquire_is_fatal() {
    let mut orch = orchestrator(2);
    orch.backend_mut().queue_acquire_status(SurfaceStatus::Failed(-4));
    let err = orch.render_frame(&mut RecordingPasses::default()).unwrap_err();
    assert!(matches!(err, Error::Presentation { operation: "acquire", code: -4 }));
    assert!(err.is_fatal());
}

#[test]
fn test_stale_present_recreates() {
    for status in [SurfaceStatus::Suboptimal, SurfaceStatus::OutOfDate] {
        let mut orch = orchestrator(2);
        let mut passes = RecordingPasses::default();
        orch.render_frame(&mut passes).unwrap();
        orch.backend_mut().queue_present_status(status);

        assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::SurfaceRecreated);
        assert_eq!(orch.random_seed(), 0);
        assert_eq!(orch.epoch(), 1);
        // Slot still advanced
        assert_eq!(orch.current_slot(), 0);
    }
}

#[test]
fn test_failed_present_is_fatal_but_advances() {
    let mut orch = orchestrator(2);
    orch.backend_mut().queue_present_status(SurfaceStatus::Failed(-1000));
    let err = orch.render_frame(&mut RecordingPasses::default()).unwrap_err();
    assert!(matches!(err, Error::Presentation { operation: "present", .. }));
    assert_eq!(orch.current_slot(), 1);
    assert_eq!(orch.random_seed(), 0);
}

#[test]
fn test_resize_resets_descriptor_pool() {
    let mut orch = orchestrator(2);
    let pool = orch.backend().descriptor_pool();
    orch.set_descriptor_pool(Box::new(pool));
    let mut passes = RecordingPasses::default();
    orch.render_frame(&mut passes).unwrap();
    orch.render_frame(&mut passes).unwrap();

    orch.window_mut().resize(Extent2d::new(640, 480));
    orch.backend().clear_events();
    assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::SurfaceRecreated);

    let events = orch.backend().events();
    assert_eq!(count(&events, |e| *e == HeadlessEvent::ResetDescriptorPool), 1);
    assert!(!orch.window().was_resized());
    assert_eq!(orch.random_seed(), 0);
    assert_eq!(orch.surface().extent(), Extent2d::new(640, 480));

    // Idle wait precedes the rebuild
    let idle = events.iter().position(|e| *e == HeadlessEvent::WaitIdle).unwrap();
    let rebuild = events
        .iter()
        .position(|e| matches!(e, HeadlessEvent::CreateSwapchain { .. }))
        .unwrap();
    assert!(idle < rebuild);
}

#[test]
fn test_recreation_reuses_sync_objects() {
    let mut orch = orchestrator(2);
    let before = orch.backend().events();
    let semaphores = count(&before, |e| matches!(e, HeadlessEvent::CreateSemaphore(_)));
    let fences = count(&before, |e| matches!(e, HeadlessEvent::CreateFence { .. }));
    assert_eq!(semaphores, 6);
    assert_eq!(fences, 2);

    for _ in 0..3 {
        orch.backend_mut().queue_acquire_status(SurfaceStatus::OutOfDate);
        orch.render_frame(&mut RecordingPasses::default()).unwrap();
    }

    let after = orch.backend().events();
    assert_eq!(count(&after, |e| matches!(e, HeadlessEvent::CreateSemaphore(_))), semaphores);
    assert_eq!(count(&after, |e| matches!(e, HeadlessEvent::CreateFence { .. })), fences);
    assert_eq!(count(&after, |e| matches!(e, HeadlessEvent::CreateSwapchain { .. })), 4);
    assert_eq!(orch.epoch(), 3);
}

#[test]
fn test_format_mismatch_after_recreation_is_fatal() {
    let mut orch = orchestrator(2);
    assert_eq!(orch.surface().format(), DEFAULT_SURFACE_FORMAT);
    orch.backend_mut().queue_swapchain_format(SurfaceFormat {
        format: 44,
        color_space: 0,
    });
    orch.backend_mut().queue_acquire_status(SurfaceStatus::OutOfDate);

    let err = orch.render_frame(&mut RecordingPasses::default()).unwrap_err();
    assert!(matches!(err, Error::SurfaceFormatMismatch { .. }));
    assert!(err.is_fatal());
    assert_eq!(orch.epoch(), 0);
}

#[test]
fn test_zero_area_window_blocks_until_restored() {
    let mut orch = orchestrator(2);
    orch.window_mut().resize(Extent2d::new(0, 0));
    orch.window_mut().queue_extent(Extent2d::new(0, 0));
    orch.window_mut().queue_extent(Extent2d::new(100, 50));

    assert_eq!(
        orch.render_frame(&mut RecordingPasses::default()).unwrap(),
        FrameOutcome::SurfaceRecreated
    );
    assert_eq!(orch.window().event_waits(), 2);
    let handle = orch.surface();
    assert_eq!(handle.extent(), Extent2d::new(100, 50));
    assert_eq!(handle.swapchain().image_count(), 3);
}

#[test]
fn test_unified_routing_and_multi_buffer_submission() {
    let mut orch = FrameOrchestrator::with_options(
        HeadlessBackend::new(),
        HeadlessWindow::new(Extent2d::new(16, 16)),
        1,
        QueueRouting::Unified,
    )
    .unwrap();
    let extra = orch.backend_mut().allocate_command_buffer().unwrap();

    orch.acquire_frame().unwrap().unwrap();
    let compute = orch.begin_commands(hybrid_raytracer::frame::PassKind::Compute).unwrap();
    orch.end_commands(hybrid_raytracer::frame::PassKind::Compute).unwrap();
    orch.submit_compute(&[compute, extra]).unwrap();
    orch.submit_graphics_commands().unwrap();
    assert_eq!(orch.present_frame().unwrap(), FrameOutcome::Presented);

    let submits: Vec<_> = orch
        .backend()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HeadlessEvent::Submit {
                queue,
                command_buffers,
                ..
            } => Some((queue, command_buffers)),
            _ => None,
        })
        .collect();
    assert_eq!(submits[0], (QueueKind::Graphics, vec![compute, extra]));
    assert_eq!(submits[1].0, QueueKind::Graphics);
    assert_eq!(submits[1].1.len(), 1);
}

#[test]
fn test_teardown_waits_idle_then_destroys() {
    let orch = orchestrator(3);
    let log = orch.backend().log();
    let pool = orch.backend().descriptor_pool();
    let mut orch = orch;
    orch.set_descriptor_pool(Box::new(pool));
    log.lock().clear();
    drop(orch);

    let events = log.lock().clone();
    assert_eq!(events.first(), Some(&HeadlessEvent::WaitIdle));
    assert_eq!(count(&events, |e| matches!(e, HeadlessEvent::DestroyFence(_))), 3);
    assert_eq!(count(&events, |e| matches!(e, HeadlessEvent::DestroySemaphore(_))), 9);
    assert_eq!(count(&events, |e| matches!(e, HeadlessEvent::FreeCommands(_))), 6);
    assert_eq!(count(&events, |e| *e == HeadlessEvent::ResetDescriptorPool), 1);
}

#[test]
fn test_failed_pass_returns_to_idle() {
    for fail_compute in [true, false] {
        let mut orch = orchestrator(2);
        let mut failing = FailingPasses { fail_compute };

        let err = orch.render_frame(&mut failing).unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(orch.stage(), FrameStage::Idle);
        assert_eq!(orch.current_slot(), 0);
        assert_eq!(
            count(&orch.backend().events(), |e| matches!(e, HeadlessEvent::Submit { .. })),
            0
        );

        // The slot fence was never reset, so the same slot is reusable
        let mut passes = RecordingPasses::default();
        assert_eq!(orch.render_frame(&mut passes).unwrap(), FrameOutcome::Presented);
        assert_eq!(passes.compute[0].slot, 0);
        assert_eq!(orch.random_seed(), 1);
    }
}
