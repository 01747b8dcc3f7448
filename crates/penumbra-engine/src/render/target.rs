use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RenderError;
use crate::render::RenderCtx;

/// Pixel format of every render target: 8-bit RGBA, filterable, blendable.
///
/// Normals are stored encoded as `n * 0.5 + 0.5`.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a render target.
///
/// Allocated once at creation; survives `resize` even though the backing
/// wgpu texture is replaced.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Render target shared between its owner (which resizes it) and the
/// materials that sample it.
pub type SharedTarget = Rc<RefCell<RenderTarget>>;

/// GPU-resident 2D image.
///
/// Either an offscreen attachment (`create`) or a static texture uploaded from
/// decoded pixels (`from_rgba`, `from_file`).
pub struct RenderTarget {
    id: TargetId,
    label: String,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,

    /// Bumped on every reallocation; dependents compare it to detect stale views.
    generation: u64,

    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    /// Allocates an empty target usable as both attachment and sampler input.
    pub fn create(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST;
        Self::allocate_new(device, label, width, height, usage)
    }

    /// Uploads tightly packed RGBA8 rows (row 0 first) as a static texture.
    pub fn from_rgba(
        ctx: &RenderCtx<'_>,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::PixelData {
                label: label.to_string(),
                expected,
                actual: pixels.len(),
            });
        }

        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let target = Self::allocate_new(ctx.device, label, width, height, usage)?;

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        Ok(target)
    }

    /// Decodes an image file and uploads it as a static texture.
    ///
    /// Rows are flipped so texel row 0 is the bottom of the picture, matching
    /// the Y-up pixel space sprites are drawn in.
    pub fn from_file(ctx: &RenderCtx<'_>, path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rgba = decoded.to_rgba8();
        image::imageops::flip_vertical_in_place(&mut rgba);
        let (width, height) = rgba.dimensions();

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        log::debug!("decoded {} ({width}x{height})", path.display());
        Self::from_rgba(ctx, &label, width, height, rgba.as_raw())
    }

    /// Wraps the target for shared ownership.
    pub fn into_shared(self) -> SharedTarget {
        Rc::new(RefCell::new(self))
    }

    /// Reallocates the backing texture at the new size.
    ///
    /// Previous contents are discarded. Returns `Ok(false)` without touching the
    /// texture when the size is unchanged or either dimension is zero (a
    /// minimized window).
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            log::debug!("{}: ignoring resize to {width}x{height}", self.label);
            return Ok(false);
        }
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }

        check_extent(device, &self.label, width, height)?;
        let (texture, view) = allocate(device, &self.label, width, height, self.usage);

        self.texture = texture;
        self.view = view;
        self.width = width;
        self.height = height;
        self.generation = self.generation.wrapping_add(1);

        log::debug!("{}: resized to {width}x{height}", self.label);
        Ok(true)
    }

    /// Backend-facing handle, stable for the lifetime of the target.
    #[inline]
    pub fn handle(&self) -> TargetId {
        self.id
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        TARGET_FORMAT
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_attachment(&self) -> bool {
        self.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    fn allocate_new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> Result<Self, RenderError> {
        check_extent(device, label, width, height)?;
        let (texture, view) = allocate(device, label, width, height, usage);

        log::debug!("allocated render target `{label}` ({width}x{height})");
        Ok(Self {
            id: TargetId::next(),
            label: label.to_string(),
            width,
            height,
            usage,
            generation: 0,
            texture,
            view,
        })
    }
}

fn check_extent(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> Result<(), RenderError> {
    let max = device.limits().max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(RenderError::TargetAllocation {
            label: label.to_string(),
            width,
            height,
            max,
        });
    }
    Ok(())
}

fn allocate(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
