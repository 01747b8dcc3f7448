use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;

use penumbra_engine::core::{App, AppControl, FrameCtx};
use penumbra_engine::coords::Rect;
use penumbra_engine::device::Gpu;
use penumbra_engine::input::Key;
use penumbra_engine::render::deferred::{DeferredRenderer, FrameDraws};
use penumbra_engine::render::{Material, MaterialHandle, RenderCtx, RenderTarget};
use penumbra_engine::time::FpsCounter;

use crate::config::SceneConfig;
use crate::materials::{self, COLOR_MAP_PARAM, NORMAL_MAP_PARAM};
use crate::scene;

pub const WINDOW_TITLE: &str = "2D Deferred Lighting";

/// GPU-side state, created once the window and device exist.
struct Resources {
    renderer: DeferredRenderer,
    sprite: MaterialHandle,
    light: MaterialHandle,
    /// Full extent of the sprite texture, in texels.
    sprite_source: Rect,
}

impl Resources {
    fn new(ctx: &RenderCtx<'_>, config: &SceneConfig, size: PhysicalSize<u32>) -> Result<Self> {
        let color = RenderTarget::from_file(ctx, config.color_texture_path())
            .context("loading sprite color texture")?;
        let normal = RenderTarget::from_file(ctx, config.normal_texture_path())
            .context("loading sprite normal texture")?;
        let (tex_w, tex_h) = color.size();
        let (color, normal) = (color.into_shared(), normal.into_shared());

        let sprite = Material::new("sprite", materials::sprite_program()?);
        sprite.set_texture(COLOR_MAP_PARAM, &color);
        sprite.set_texture(NORMAL_MAP_PARAM, &normal);

        let light = Material::new("light", materials::light_program()?);
        let composition = Material::new("composition", materials::composition_program()?);

        let renderer = DeferredRenderer::new(ctx, size.width, size.height, composition)
            .context("creating deferred renderer")?;
        renderer.attach_normal_input(&light);

        Ok(Self {
            renderer,
            sprite,
            light,
            sprite_source: Rect::new(0.0, 0.0, tex_w as f32, tex_h as f32),
        })
    }
}

/// The classic deferred lighting scene: a sprite grid lit by three moving
/// colored lights, a cursor light and an optional dense light grid.
pub struct DemoApp {
    config: SceneConfig,
    resources: Option<Resources>,
    startup_error: Option<anyhow::Error>,

    draws: FrameDraws,
    fps: FpsCounter,
    dense_grid: bool,
    paused: bool,
    anim_time: f32,
}

impl DemoApp {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            dense_grid: config.dense_grid,
            config,
            resources: None,
            startup_error: None,
            draws: FrameDraws::default(),
            fps: FpsCounter::default(),
            paused: false,
            anim_time: 0.0,
        }
    }

    /// The error that aborted startup, if any.
    pub fn take_startup_error(&mut self) -> Option<anyhow::Error> {
        self.startup_error.take()
    }

    fn handle_keys(&mut self, ctx: &FrameCtx<'_, '_>) -> AppControl {
        let pressed = |key| ctx.input_frame.pressed(key);
        if pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if pressed(Key::L) {
            self.dense_grid = !self.dense_grid;
            log::info!("dense light grid {}", if self.dense_grid { "on" } else { "off" });
        }
        if pressed(Key::Space) {
            self.paused = !self.paused;
        }
        AppControl::Continue
    }

    fn build_draws(&mut self, pointer: Option<(f32, f32)>, height: f32) {
        let Some(res) = self.resources.as_ref() else { return };
        let draws = &mut self.draws;
        draws.clear();

        scene::push_sprites(&mut draws.geometry, &self.config, res.sprite_source, &res.sprite);

        scene::push_animated_lights(&mut draws.lighting, &self.config, self.anim_time, &res.light);
        if self.dense_grid {
            scene::push_light_grid(&mut draws.lighting, &self.config, &res.light);
        }
        if let Some(pointer) = pointer.filter(|_| self.config.cursor_light) {
            scene::push_cursor_light(&mut draws.lighting, &self.config, pointer, height, &res.light);
        }
    }
}

impl App for DemoApp {
    fn on_resize(&mut self, gpu: &Gpu<'_>, size: PhysicalSize<u32>) -> AppControl {
        let ctx = gpu.render_ctx();

        match self.resources.as_mut() {
            Some(res) => {
                if let Err(e) = res.renderer.resize(&ctx, size.width, size.height) {
                    log::error!("resize to {}x{} failed: {e}", size.width, size.height);
                    self.startup_error = Some(e.into());
                    return AppControl::Exit;
                }
            }
            None => match Resources::new(&ctx, &self.config, size) {
                Ok(res) => {
                    log::info!("scene ready, assets from {}", self.config.asset_dir.display());
                    self.resources = Some(res);
                }
                Err(e) => {
                    log::error!("startup failed: {e:#}");
                    self.startup_error = Some(e);
                    return AppControl::Exit;
                }
            },
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.handle_keys(ctx) == AppControl::Exit {
            return AppControl::Exit;
        }

        if !self.paused {
            self.anim_time += ctx.time.dt;
        }
        if let Some(fps) = self.fps.tick(ctx.time.now) {
            ctx.set_title(&format!("{WINDOW_TITLE} FPS: {fps}"));
        }

        let (_, height) = ctx.surface_size();
        self.build_draws(ctx.input.pointer_pos, height as f32);

        let Some(res) = self.resources.as_mut() else {
            return AppControl::Continue;
        };
        let renderer = &mut res.renderer;
        let draws = &self.draws;

        ctx.render(|rctx, target| {
            let stats = renderer.render(rctx, target, draws);
            if stats.skipped > 0 {
                log::trace!("{} batches skipped this frame", stats.skipped);
            }
        })
    }
}
