use crate::render::FrameTarget;

/// One acquired swapchain image plus the encoder the frame records into.
///
/// Short-lived: holding the surface texture blocks acquisition of the next
/// frame. Hand it back through `Gpu::submit`.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuFrame {
    /// Encoder + swapchain view for renderers.
    pub fn target(&mut self) -> FrameTarget<'_> {
        FrameTarget::new(&mut self.encoder, &self.view)
    }

    pub fn size(&self) -> (u32, u32) {
        let t = &self.surface_texture.texture;
        (t.width(), t.height())
    }
}
