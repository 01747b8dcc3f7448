use crate::coords::Vec2;
use crate::error::RenderError;
use crate::render::batch::{
    BatchSink, BatchStats, DrawRequest, PassSink, SpriteBatcher, VertexUpload,
};
use crate::render::material::{Material, MaterialHandle, PipelineKey};
use crate::render::target::{RenderTarget, SharedTarget};
use crate::render::uniform::UniformUpload;
use crate::render::{FrameTarget, RenderCtx};

use super::framebuffer::Framebuffer;
use super::pass::{DrawSource, PassDesc, PassTarget, DEFERRED_PASSES};

/// Composition material input receiving the sprite color target.
pub const COMPOSITE_COLOR_PARAM: &str = "color_screen";
/// Composition material input receiving the lighting target.
pub const COMPOSITE_LIGHT_PARAM: &str = "light_screen";
/// Light material input receiving the sprite normal target.
pub const LIGHT_NORMAL_PARAM: &str = "normal_screen";

/// Draw lists for one frame, in submission order.
#[derive(Debug, Default, Clone)]
pub struct FrameDraws {
    pub geometry: Vec<DrawRequest>,
    pub lighting: Vec<DrawRequest>,
}

impl FrameDraws {
    pub fn clear(&mut self) {
        self.geometry.clear();
        self.lighting.clear();
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub geometry: BatchStats,
    pub lighting: BatchStats,
    /// Batched draw calls that reached the GPU.
    pub draw_calls: u32,
    /// Composition draws issued (one per frame unless its material failed).
    pub composite_draws: u32,
    /// Batches dropped because their material could not be bound.
    pub skipped: u32,
}

/// Draws every request through `batcher`, then flushes the tail.
///
/// Returns the counters of this submission only.
pub fn submit_batched<S: BatchSink + ?Sized>(
    batcher: &mut SpriteBatcher,
    draws: &[DrawRequest],
    sink: &mut S,
) -> BatchStats {
    batcher.take_stats();
    for d in draws {
        batcher.draw(sink, d.dest, d.source, d.color, &d.material);
    }
    batcher.flush(sink);
    batcher.take_stats()
}

/// Three-pass deferred pipeline: sprites into color + normal, lights into a
/// lighting target, then color × light onto the surface.
pub struct DeferredRenderer {
    screen_color: SharedTarget,
    screen_normal: SharedTarget,
    screen_lighting: SharedTarget,

    sprite_buffer: Framebuffer,
    light_buffer: Framebuffer,

    batcher: SpriteBatcher,
    upload: VertexUpload,
    uniforms: UniformUpload,
    composition: MaterialHandle,

    passes: [PassDesc; 3],
}

impl DeferredRenderer {
    /// Allocates the three screen targets at `width × height` and wires them
    /// into `composition`.
    pub fn new(
        ctx: &RenderCtx<'_>,
        width: u32,
        height: u32,
        composition: MaterialHandle,
    ) -> Result<Self, RenderError> {
        let screen_color =
            RenderTarget::create(ctx.device, "screen color", width, height)?.into_shared();
        let screen_normal =
            RenderTarget::create(ctx.device, "screen normal", width, height)?.into_shared();
        let screen_lighting =
            RenderTarget::create(ctx.device, "screen lighting", width, height)?.into_shared();

        let sprite_buffer = Framebuffer::new(&[screen_color.clone(), screen_normal.clone()]);
        let light_buffer = Framebuffer::new(&[screen_lighting.clone()]);

        let has_color = composition.set_texture(COMPOSITE_COLOR_PARAM, &screen_color);
        let has_light = composition.set_texture(COMPOSITE_LIGHT_PARAM, &screen_lighting);
        if !(has_color && has_light) {
            log::warn!(
                "composition material `{}` lacks `{COMPOSITE_COLOR_PARAM}` or `{COMPOSITE_LIGHT_PARAM}`",
                composition.label()
            );
        }

        log::info!("deferred renderer ready ({width}x{height})");

        Ok(Self {
            screen_color,
            screen_normal,
            screen_lighting,
            sprite_buffer,
            light_buffer,
            batcher: SpriteBatcher::new(Vec2::new(width as f32, height as f32)),
            upload: VertexUpload::new(),
            uniforms: UniformUpload::for_device(ctx.device),
            composition,
            passes: DEFERRED_PASSES,
        })
    }

    /// The fixed pass list, in execution order.
    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }

    pub fn size(&self) -> (u32, u32) {
        self.screen_color.borrow().size()
    }

    pub fn screen_color(&self) -> &SharedTarget {
        &self.screen_color
    }

    pub fn screen_normal(&self) -> &SharedTarget {
        &self.screen_normal
    }

    pub fn screen_lighting(&self) -> &SharedTarget {
        &self.screen_lighting
    }

    pub fn batcher(&self) -> &SpriteBatcher {
        &self.batcher
    }

    /// Points a light material's normal input at the geometry pass output.
    pub fn attach_normal_input(&self, material: &Material) -> bool {
        material.set_texture(LIGHT_NORMAL_PARAM, &self.screen_normal)
    }

    /// Reallocates all screen targets and updates the screen transform.
    ///
    /// Zero sizes (minimized window) are ignored. Returns whether anything
    /// was reallocated.
    pub fn resize(
        &mut self,
        ctx: &RenderCtx<'_>,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            return Ok(false);
        }

        let mut changed = false;
        for target in [&self.screen_color, &self.screen_normal, &self.screen_lighting] {
            changed |= target.borrow_mut().resize(ctx.device, width, height)?;
        }

        if changed {
            self.batcher.set_screen_size(Vec2::new(width as f32, height as f32));
            log::debug!("deferred renderer resized to {width}x{height}");
        }
        Ok(changed)
    }

    /// Records all passes of one frame into `frame.encoder`.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        frame: &mut FrameTarget<'_>,
        draws: &FrameDraws,
    ) -> FrameStats {
        self.upload.begin_frame();
        self.uniforms.begin_frame();
        let mut stats = FrameStats::default();

        for desc in self.passes {
            let list = match desc.source {
                DrawSource::Geometry => &draws.geometry,
                DrawSource::Lighting => &draws.lighting,
                DrawSource::Composite => {
                    stats.composite_draws += self.composite(ctx, frame, &desc);
                    continue;
                }
            };
            let framebuffer = match desc.target {
                PassTarget::SpriteBuffer => &self.sprite_buffer,
                PassTarget::LightBuffer => &self.light_buffer,
                PassTarget::Surface => {
                    log::warn!("{}: batched draws cannot target the surface", desc.label);
                    continue;
                }
            };

            let key = PipelineKey::new(&framebuffer.formats(), desc.blend);
            let mut pass = framebuffer.begin_pass(frame.encoder, desc.label, desc.clear);
            let mut sink =
                PassSink::new(ctx, &mut pass, &mut self.upload, &mut self.uniforms, &key);

            let batch = submit_batched(&mut self.batcher, list, &mut sink);
            stats.draw_calls += sink.draw_calls();
            stats.skipped += sink.skipped();
            match desc.source {
                DrawSource::Geometry => stats.geometry.merge(batch),
                _ => stats.lighting.merge(batch),
            }
        }

        log::trace!(
            "frame: geometry {:?}, lighting {:?}, composite {}",
            stats.geometry,
            stats.lighting,
            stats.composite_draws
        );
        stats
    }

    fn composite(
        &mut self,
        ctx: &RenderCtx<'_>,
        frame: &mut FrameTarget<'_>,
        desc: &PassDesc,
    ) -> u32 {
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(desc.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(desc.clear.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let key = PipelineKey::new(&[ctx.surface_format], desc.blend);
        if let Err(e) = self.composition.bind(ctx, &mut pass, &key, &mut self.uniforms) {
            log::warn!("skipping composition: {e}");
            return 0;
        }
        pass.draw(0..3, 0..1);
        self.composition.unbind();
        1
    }
}

impl Drop for DeferredRenderer {
    fn drop(&mut self) {
        self.batcher.clear_material();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::coords::{ColorRgba, Rect};
    use crate::render::test_support::{
        test_device, test_material, test_program, RecordingSink, COMPOSITION_FRAGMENT,
        FULLSCREEN_VERTEX, GBUFFER_FRAGMENT, LIGHT_FRAGMENT, SPRITE_VERTEX,
    };
    use crate::render::{VertexInput, TARGET_FORMAT};

    fn demo_frame() -> (MaterialHandle, MaterialHandle, FrameDraws) {
        let sprites = test_material("sprite");
        let lights = test_material("light");

        let mut draws = FrameDraws::default();
        for i in 0..8 {
            for j in 0..6 {
                draws.geometry.push(DrawRequest::new(
                    Rect::new(i as f32 * 100.0, j as f32 * 100.0, 200.0, 200.0),
                    Rect::new(0.0, 0.0, 1024.0, 1024.0),
                    ColorRgba::white(),
                    &sprites,
                ));
            }
        }
        for color in [
            ColorRgba::new(1.0, 0.0, 0.0, 1.0),
            ColorRgba::new(0.0, 1.0, 0.0, 1.0),
            ColorRgba::new(0.0, 0.0, 1.0, 1.0),
        ] {
            draws.lighting.push(DrawRequest::new(
                Rect::new(100.0, 100.0, 400.0, 400.0),
                Rect::unit(),
                color,
                &lights,
            ));
        }
        (sprites, lights, draws)
    }

    #[test]
    fn sprites_then_lights_take_two_draw_calls() {
        let (sprites, lights, draws) = demo_frame();
        let mut batcher = SpriteBatcher::new(Vec2::new(1280.0, 960.0));
        let mut sink = RecordingSink::default();

        let all: Vec<_> = draws.geometry.iter().chain(draws.lighting.iter()).cloned().collect();
        let stats = submit_batched(&mut batcher, &all, &mut sink);

        assert_eq!(sink.batches.len(), 2);
        assert!(Rc::ptr_eq(&sink.batches[0].material, &sprites));
        assert_eq!(sink.batches[0].vertices.len(), 48 * 6);
        assert!(Rc::ptr_eq(&sink.batches[1].material, &lights));
        assert_eq!(sink.batches[1].vertices.len(), 3 * 6);
        assert_eq!(stats, BatchStats { draws: 51, flushes: 2, vertices: 306 });
    }

    #[test]
    fn each_pass_flushes_its_own_run() {
        let (_sprites, _lights, draws) = demo_frame();
        let mut batcher = SpriteBatcher::new(Vec2::new(1280.0, 960.0));

        let mut geometry = RecordingSink::default();
        let g = submit_batched(&mut batcher, &draws.geometry, &mut geometry);
        let mut lighting = RecordingSink::default();
        let l = submit_batched(&mut batcher, &draws.lighting, &mut lighting);

        assert_eq!((g.flushes, l.flushes), (1, 1));
        assert_eq!(geometry.batches.len(), 1);
        assert_eq!(lighting.batches.len(), 1);
        assert!(batcher.pending().is_empty());
    }

    #[test]
    fn empty_pass_issues_no_draw() {
        let mut batcher = SpriteBatcher::new(Vec2::new(64.0, 64.0));
        let mut sink = RecordingSink::default();
        let stats = submit_batched(&mut batcher, &[], &mut sink);
        assert!(sink.batches.is_empty());
        assert_eq!(stats, BatchStats::default());
    }

    // ── GPU-backed ────────────────────────────────────────────────────────

    struct GpuScene {
        renderer: DeferredRenderer,
        sprite: MaterialHandle,
        light: MaterialHandle,
    }

    fn gpu_scene(ctx: &RenderCtx<'_>, width: u32, height: u32) -> GpuScene {
        let composition = Material::new(
            "composition",
            test_program("composition", FULLSCREEN_VERTEX, COMPOSITION_FRAGMENT, VertexInput::None),
        );
        let renderer = DeferredRenderer::new(ctx, width, height, composition).unwrap();

        let texels = RenderTarget::from_rgba(ctx, "texels", 2, 2, &[200u8; 16])
            .unwrap()
            .into_shared();
        let sprite = Material::new(
            "sprite",
            test_program("sprite", SPRITE_VERTEX, GBUFFER_FRAGMENT, VertexInput::Sprite),
        );
        assert!(sprite.set_texture("color_map", &texels));
        assert!(sprite.set_texture("normal_map", &texels));

        let light = Material::new(
            "light",
            test_program("light", SPRITE_VERTEX, LIGHT_FRAGMENT, VertexInput::Sprite),
        );
        GpuScene { renderer, sprite, light }
    }

    fn record_frame(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        renderer: &mut DeferredRenderer,
        draws: &FrameDraws,
    ) -> FrameStats {
        let ctx = RenderCtx::new(device, queue, TARGET_FORMAT);
        let (width, height) = renderer.size();
        let surface = RenderTarget::create(device, "offscreen surface", width, height).unwrap();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("test frame"),
        });
        let stats = {
            let mut frame = FrameTarget::new(&mut encoder, surface.view());
            renderer.render(&ctx, &mut frame, draws)
        };
        queue.submit([encoder.finish()]);
        stats
    }

    fn small_frame(scene: &GpuScene) -> FrameDraws {
        let mut draws = FrameDraws::default();
        for i in 0..4 {
            draws.geometry.push(DrawRequest::new(
                Rect::new(i as f32 * 50.0, 10.0, 40.0, 40.0),
                Rect::new(0.0, 0.0, 2.0, 2.0),
                ColorRgba::white(),
                &scene.sprite,
            ));
        }
        draws.lighting.push(DrawRequest::new(
            Rect::new(0.0, 0.0, 160.0, 160.0),
            Rect::unit(),
            ColorRgba::new(1.0, 0.5, 0.25, 1.0),
            &scene.light,
        ));
        draws
    }

    #[test]
    fn resize_reallocates_every_target_and_screen_transform() {
        let Some((device, queue)) = test_device() else { return };
        let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT);
        let mut scene = gpu_scene(&ctx, 320, 240);
        let renderer = &mut scene.renderer;

        let targets = [
            Rc::clone(renderer.screen_color()),
            Rc::clone(renderer.screen_normal()),
            Rc::clone(renderer.screen_lighting()),
        ];
        let before: Vec<u64> = targets.iter().map(|t| t.borrow().generation()).collect();

        assert!(renderer.resize(&ctx, 640, 480).unwrap());

        for (target, generation) in targets.iter().zip(before) {
            let target = target.borrow();
            assert_eq!(target.size(), (640, 480));
            assert_eq!(target.generation(), generation + 1);
        }
        assert_eq!(renderer.size(), (640, 480));
        assert_eq!(renderer.batcher().screen_size(), Vec2::new(640.0, 480.0));

        assert!(!renderer.resize(&ctx, 640, 480).unwrap());
        assert!(!renderer.resize(&ctx, 0, 0).unwrap());
        assert_eq!(renderer.size(), (640, 480));
    }

    #[test]
    fn render_runs_one_flush_per_pass_and_one_composite() {
        let Some((device, queue)) = test_device() else { return };
        let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT);
        let mut scene = gpu_scene(&ctx, 320, 240);
        assert!(scene.renderer.attach_normal_input(&scene.light));

        let draws = small_frame(&scene);
        let stats = record_frame(&device, &queue, &mut scene.renderer, &draws);

        assert_eq!(stats.geometry.flushes, 1);
        assert_eq!(stats.geometry.vertices, 4 * 6);
        assert_eq!(stats.lighting.flushes, 1);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.composite_draws, 1);
        assert_eq!(stats.skipped, 0);
        assert!(!scene.sprite.is_bound());
        assert!(!scene.light.is_bound());
    }

    #[test]
    fn render_after_resize_uses_new_targets() {
        let Some((device, queue)) = test_device() else { return };
        let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT);
        let mut scene = gpu_scene(&ctx, 320, 240);
        assert!(scene.renderer.attach_normal_input(&scene.light));

        let draws = small_frame(&scene);
        record_frame(&device, &queue, &mut scene.renderer, &draws);
        scene.renderer.resize(&ctx, 400, 300).unwrap();
        let stats = record_frame(&device, &queue, &mut scene.renderer, &draws);

        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.composite_draws, 1);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn light_without_normal_input_is_skipped() {
        let Some((device, queue)) = test_device() else { return };
        let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT);
        let mut scene = gpu_scene(&ctx, 320, 240);

        let draws = small_frame(&scene);
        let stats = record_frame(&device, &queue, &mut scene.renderer, &draws);

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.lighting.flushes, 1);
        assert_eq!(stats.composite_draws, 1);
    }
}
