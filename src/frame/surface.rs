//! Presentation surface lifecycle.
//!
//! The image set is replaced wholesale on resize or when the presentation
//! engine reports it stale. Other components hold a [`SurfaceHandle`] and
//! compare its epoch against the orchestrator's to notice a rebuild.

use std::sync::Arc;

use super::backend::{Backend, Extent2d, SurfaceFormat, Swapchain, Window};
use crate::util::{Error, Result};

/// Current image set plus the number of times it has been rebuilt.
pub struct SurfaceState<S> {
    swapchain: Arc<S>,
    epoch: u64,
}

impl<S: Swapchain> SurfaceState<S> {
    /// Initial creation.
    pub fn create<B, W>(backend: &mut B, window: &mut W) -> Result<Self>
    where
        B: Backend<Swapchain = S>,
        W: Window,
    {
        let extent = wait_for_drawable(window);
        backend.wait_idle()?;
        let swapchain = backend.create_swapchain(extent, None)?;
        tracing::debug!(
            %extent,
            format = %swapchain.format(),
            images = swapchain.image_count(),
            "surface created"
        );
        Ok(Self {
            swapchain: Arc::new(swapchain),
            epoch: 0,
        })
    }

    /// Rebuild the image set for the window's current extent.
    ///
    /// Blocks while the window is minimized, then waits for the device to
    /// go idle. The new image set must keep the previous format.
    #[tracing::instrument(skip_all, fields(epoch = self.epoch))]
    pub fn recreate<B, W>(&mut self, backend: &mut B, window: &mut W) -> Result<()>
    where
        B: Backend<Swapchain = S>,
        W: Window,
    {
        let extent = wait_for_drawable(window);
        backend.wait_idle()?;

        let previous = self.swapchain.format();
        let swapchain = backend.create_swapchain(extent, Some(self.swapchain.as_ref()))?;
        let current = swapchain.format();
        if current != previous {
            return Err(Error::SurfaceFormatMismatch {
                previous: previous.to_string(),
                current: current.to_string(),
            });
        }

        self.swapchain = Arc::new(swapchain);
        self.epoch += 1;
        tracing::debug!(%extent, epoch = self.epoch, "surface recreated");
        Ok(())
    }

    pub fn swapchain(&self) -> &S {
        &self.swapchain
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn format(&self) -> SurfaceFormat {
        self.swapchain.format()
    }

    pub fn extent(&self) -> Extent2d {
        self.swapchain.extent()
    }

    pub fn handle(&self) -> SurfaceHandle<S> {
        SurfaceHandle {
            swapchain: Arc::clone(&self.swapchain),
            epoch: self.epoch,
        }
    }
}

/// Shared, read-only view of one generation of the image set.
pub struct SurfaceHandle<S> {
    swapchain: Arc<S>,
    epoch: u64,
}

impl<S> Clone for SurfaceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            swapchain: Arc::clone(&self.swapchain),
            epoch: self.epoch,
        }
    }
}

impl<S: Swapchain> SurfaceHandle<S> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn swapchain(&self) -> &S {
        &self.swapchain
    }

    pub fn extent(&self) -> Extent2d {
        self.swapchain.extent()
    }

    pub fn format(&self) -> SurfaceFormat {
        self.swapchain.format()
    }
}

/// Spin on window events until the surface has a non-zero area.
fn wait_for_drawable<W: Window>(window: &mut W) -> Extent2d {
    let mut extent = window.extent();
    if extent.is_zero_area() {
        tracing::debug!("surface has zero area, waiting for events");
    }
    while extent.is_zero_area() {
        window.wait_events();
        extent = window.extent();
    }
    extent
}
