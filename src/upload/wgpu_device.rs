//! `wgpu` implementation of [`BufferDevice`].

use wgpu::util::DeviceExt;

use super::BufferDevice;
use crate::util::{Error, Result};

/// Uploads through a wgpu device and queue.
pub struct WgpuBufferDevice<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> WgpuBufferDevice<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl BufferDevice for WgpuBufferDevice<'_> {
    type Buffer = wgpu::Buffer;

    fn create_staging_buffer(&mut self, label: &str, contents: &[u8]) -> Result<wgpu::Buffer> {
        // wgpu rejects zero-sized buffers
        let padding = [0u8; 4];
        Ok(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: if contents.is_empty() { &padding } else { contents },
            usage: wgpu::BufferUsages::COPY_SRC,
        }))
    }

    fn create_storage_buffer(&mut self, label: &str, size: u64) -> Result<wgpu::Buffer> {
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn copy_buffer(&mut self, src: &wgpu::Buffer, dst: &wgpu::Buffer, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_upload"),
            });
        encoder.copy_buffer_to_buffer(src, 0, dst, 0, size);
        self.queue.submit(Some(encoder.finish()));
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Buffer(format!("upload wait failed: {}", e)))?;
        Ok(())
    }
}
