//! Scene upload through a device/buffer collaborator.
//!
//! Each payload goes through a host-visible staging buffer into a
//! device-local storage buffer. Staging buffers live only for the copy.
//!
//! ## Usage
//! ```ignore
//! let data = build_gpu_data(&bvh, &spheres, &config.limits())?;
//! let buffers = upload_scene(&mut device, &data)?;
//! // bind buffers.nodes / buffers.primitives to the sampling pass
//! ```

mod arena;
#[cfg(feature = "wgpu")]
pub mod wgpu_device;

pub use arena::FixedArray;

use bytemuck::Pod;

use crate::bvh::GpuSceneData;
use crate::util::Result;

/// Buffer creation and copy operations the upload needs from the device.
pub trait BufferDevice {
    type Buffer;

    /// Host-visible buffer initialized with `contents`, usable as a copy source.
    fn create_staging_buffer(&mut self, label: &str, contents: &[u8]) -> Result<Self::Buffer>;

    /// Device-local storage buffer of `size` bytes, usable as a copy destination.
    fn create_storage_buffer(&mut self, label: &str, size: u64) -> Result<Self::Buffer>;

    /// Copy `size` bytes from `src` to `dst` and wait for completion.
    fn copy_buffer(&mut self, src: &Self::Buffer, dst: &Self::Buffer, size: u64) -> Result<()>;
}

/// Device-local buffers holding an uploaded scene.
pub struct SceneBuffers<B> {
    pub nodes: B,
    pub primitives: B,
    pub node_count: u32,
    pub primitive_count: u32,
}

/// Upload one fixed-capacity payload via a scoped staging buffer.
pub fn upload_array<D: BufferDevice, T: Pod>(
    device: &mut D,
    label: &str,
    array: &FixedArray<T>,
) -> Result<D::Buffer> {
    let bytes = array.padded_bytes();
    let size = bytes.len() as u64;

    let staging = device.create_staging_buffer(&format!("{}_staging", label), &bytes)?;
    let buffer = device.create_storage_buffer(label, size)?;
    device.copy_buffer(&staging, &buffer, size)?;
    drop(staging);

    tracing::trace!(label, size, items = array.len(), "uploaded array");
    Ok(buffer)
}

/// Upload the node array and the primitive array.
#[tracing::instrument(skip_all, fields(nodes = data.node_count(), prims = data.primitive_count()))]
pub fn upload_scene<D: BufferDevice, T: Pod>(
    device: &mut D,
    data: &GpuSceneData<T>,
) -> Result<SceneBuffers<D::Buffer>> {
    let nodes = upload_array(device, "bvh_nodes", &data.nodes)?;
    let primitives = upload_array(device, "primitives", &data.primitives)?;

    Ok(SceneBuffers {
        nodes,
        primitives,
        node_count: data.node_count() as u32,
        primitive_count: data.primitive_count() as u32,
    })
}
