use crate::render::material::{MaterialHandle, PipelineKey};
use crate::render::uniform::UniformUpload;
use crate::render::RenderCtx;

use super::{Vertex, VertexUpload};

/// GPU side of a batch flush.
///
/// The batcher hands over one material run at a time; implementations bind the
/// material, upload the vertices, issue one draw and unbind.
pub trait BatchSink {
    fn draw_batch(&mut self, material: &MaterialHandle, vertices: &[Vertex]);
}

/// Draws batches into an open wgpu render pass.
pub struct PassSink<'a, 'p> {
    ctx: &'a RenderCtx<'a>,
    pass: &'a mut wgpu::RenderPass<'p>,
    upload: &'a mut VertexUpload,
    uniforms: &'a mut UniformUpload,
    key: &'a PipelineKey,

    draw_calls: u32,
    skipped: u32,
}

impl<'a, 'p> PassSink<'a, 'p> {
    pub fn new(
        ctx: &'a RenderCtx<'a>,
        pass: &'a mut wgpu::RenderPass<'p>,
        upload: &'a mut VertexUpload,
        uniforms: &'a mut UniformUpload,
        key: &'a PipelineKey,
    ) -> Self {
        Self {
            ctx,
            pass,
            upload,
            uniforms,
            key,
            draw_calls: 0,
            skipped: 0,
        }
    }

    /// Draw calls issued so far.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Batches dropped because their material could not be bound.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }
}

impl BatchSink for PassSink<'_, '_> {
    fn draw_batch(&mut self, material: &MaterialHandle, vertices: &[Vertex]) {
        if let Err(e) = material.bind(self.ctx, self.pass, self.key, self.uniforms) {
            log::warn!("skipping batch of {} vertices: {e}", vertices.len());
            self.skipped += 1;
            return;
        }

        if let Some((buffer, range)) = self.upload.write(self.ctx, vertices) {
            self.pass.set_vertex_buffer(0, buffer.slice(range));
            self.pass.draw(0..vertices.len() as u32, 0..1);
            self.draw_calls += 1;
        }

        material.unbind();
    }
}
