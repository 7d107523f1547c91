use crate::render::RenderTarget;

/// An acquired swapchain image.
///
/// Holding it blocks the next acquisition; hand it back through
/// [`Gpu::present`](super::Gpu::present).
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub depth_stencil: wgpu::TextureView,
}

impl GpuFrame {
    /// Target for a [`WgpuBackend`](crate::render::WgpuBackend), optionally
    /// clearing on the first pass.
    pub fn target(&self, clear: Option<wgpu::Color>) -> RenderTarget {
        RenderTarget {
            color: self.view.clone(),
            depth_stencil: self.depth_stencil.clone(),
            clear,
        }
    }
}
