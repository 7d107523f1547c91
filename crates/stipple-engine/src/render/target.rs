/// Attachments a [`WgpuBackend`](super::WgpuBackend) renders into.
///
/// `depth_stencil` must use the backend's depth format. When `clear` is set,
/// the first pass after [`set_target`](super::WgpuBackend::set_target) clears
/// color to it, depth to 1 and stencil to 0.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub color: wgpu::TextureView,
    pub depth_stencil: wgpu::TextureView,
    pub clear: Option<wgpu::Color>,
}

impl RenderTarget {
    #[inline]
    pub fn new(color: wgpu::TextureView, depth_stencil: wgpu::TextureView) -> Self {
        Self {
            color,
            depth_stencil,
            clear: None,
        }
    }

    #[inline]
    pub fn with_clear(mut self, color: wgpu::Color) -> Self {
        self.clear = Some(color);
        self
    }
}
