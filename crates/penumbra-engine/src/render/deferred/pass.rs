use crate::coords::ColorRgba;
use crate::render::blend::BlendMode;

/// Which attachments a pass renders into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PassTarget {
    /// Color + normal targets.
    SpriteBuffer,
    /// Lighting target.
    LightBuffer,
    /// The window's swapchain image.
    Surface,
}

/// Where a pass gets its draws from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawSource {
    /// `FrameDraws::geometry`, batched.
    Geometry,
    /// `FrameDraws::lighting`, batched.
    Lighting,
    /// One full-screen triangle with the composition material.
    Composite,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassDesc {
    pub label: &'static str,
    pub target: PassTarget,
    pub blend: BlendMode,
    pub clear: ColorRgba,
    pub source: DrawSource,
}

/// Geometry → lighting → composition.
pub const DEFERRED_PASSES: [PassDesc; 3] = [
    PassDesc {
        label: "penumbra geometry pass",
        target: PassTarget::SpriteBuffer,
        blend: BlendMode::Alpha,
        clear: ColorRgba::transparent(),
        source: DrawSource::Geometry,
    },
    PassDesc {
        label: "penumbra lighting pass",
        target: PassTarget::LightBuffer,
        blend: BlendMode::Additive,
        clear: ColorRgba::transparent(),
        source: DrawSource::Lighting,
    },
    PassDesc {
        label: "penumbra composition pass",
        target: PassTarget::Surface,
        blend: BlendMode::Disabled,
        clear: ColorRgba::black(),
        source: DrawSource::Composite,
    },
];
