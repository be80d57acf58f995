//! Per-frame synchronization objects and command targets.

use super::backend::{Backend, PassKind};
use crate::util::{Error, Result};

/// One of the `F` rotating frame slots.
///
/// Created once at orchestrator construction and never recreated with the
/// surface. The fence starts signaled so the first wait returns at once.
pub struct FrameSlot<B: Backend> {
    pub image_available: B::Semaphore,
    pub compute_finished: B::Semaphore,
    pub graphics_finished: B::Semaphore,
    pub in_flight: B::Fence,
    pub compute_commands: B::CommandBuffer,
    pub graphics_commands: B::CommandBuffer,
}

/// Objects created so far while building a slot.
struct PartialSlot<B: Backend> {
    semaphores: Vec<B::Semaphore>,
    fence: Option<B::Fence>,
    commands: Vec<B::CommandBuffer>,
}

impl<B: Backend> PartialSlot<B> {
    fn destroy(self, backend: &mut B) {
        for commands in self.commands {
            backend.free_command_buffer(commands);
        }
        for semaphore in self.semaphores {
            backend.destroy_semaphore(semaphore);
        }
        if let Some(fence) = self.fence {
            backend.destroy_fence(fence);
        }
    }
}

impl<B: Backend> FrameSlot<B> {
    /// Create every object of one slot. On failure, whatever was already
    /// created is destroyed before the error is returned.
    pub fn create(backend: &mut B) -> Result<Self> {
        let mut partial = PartialSlot {
            semaphores: Vec::with_capacity(3),
            fence: None,
            commands: Vec::with_capacity(2),
        };
        match Self::create_into(backend, &mut partial) {
            Ok(slot) => Ok(slot),
            Err(e) => {
                partial.destroy(backend);
                Err(e)
            }
        }
    }

    fn create_into(backend: &mut B, partial: &mut PartialSlot<B>) -> Result<Self> {
        let sync_err = |e: Error| {
            Error::SyncObject(format!(
                "failed to create synchronization objects for a frame: {}",
                e
            ))
        };

        for _ in 0..3 {
            let semaphore = backend.create_semaphore().map_err(sync_err)?;
            partial.semaphores.push(semaphore);
        }
        let in_flight = backend.create_fence(true).map_err(sync_err)?;
        partial.fence = Some(in_flight);
        for _ in 0..2 {
            let commands = backend.allocate_command_buffer()?;
            partial.commands.push(commands);
        }

        Ok(Self {
            image_available: partial.semaphores[0],
            compute_finished: partial.semaphores[1],
            graphics_finished: partial.semaphores[2],
            in_flight,
            compute_commands: partial.commands[0],
            graphics_commands: partial.commands[1],
        })
    }

    pub fn commands(&self, pass: PassKind) -> B::CommandBuffer {
        match pass {
            PassKind::Compute => self.compute_commands,
            PassKind::Graphics => self.graphics_commands,
        }
    }

    pub fn destroy(self, backend: &mut B) {
        backend.free_command_buffer(self.compute_commands);
        backend.free_command_buffer(self.graphics_commands);
        backend.destroy_semaphore(self.image_available);
        backend.destroy_semaphore(self.compute_finished);
        backend.destroy_semaphore(self.graphics_finished);
        backend.destroy_fence(self.in_flight);
    }
}
