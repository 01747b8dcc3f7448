use std::cell::Ref;

use crate::coords::ColorRgba;
use crate::render::target::{RenderTarget, SharedTarget};

/// A set of render targets written together by one pass.
pub struct Framebuffer {
    attachments: Vec<SharedTarget>,
}

impl Framebuffer {
    pub fn new(attachments: &[SharedTarget]) -> Self {
        Self {
            attachments: attachments.to_vec(),
        }
    }

    /// Attachment formats in output location order.
    pub fn formats(&self) -> Vec<wgpu::TextureFormat> {
        self.attachments.iter().map(|t| t.borrow().format()).collect()
    }

    /// Opens a render pass writing every attachment, cleared to `clear`.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        clear: ColorRgba,
    ) -> wgpu::RenderPass<'e> {
        let targets: Vec<Ref<'_, RenderTarget>> =
            self.attachments.iter().map(|t| t.borrow()).collect();

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = targets
            .iter()
            .map(|t| {
                Some(wgpu::RenderPassColorAttachment {
                    view: t.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}
