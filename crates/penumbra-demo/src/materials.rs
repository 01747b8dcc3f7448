//! The demo's three shader programs.

use penumbra_engine::ShaderError;
use penumbra_engine::render::{ShaderProgram, ShaderStage, StageKind, VertexInput};

pub const COLOR_MAP_PARAM: &str = "color_map";
pub const NORMAL_MAP_PARAM: &str = "normal_map";

const SPRITE_VERT: &str = include_str!("../shaders/sprite.vert.wgsl");
const SPRITE_FRAG: &str = include_str!("../shaders/sprite.frag.wgsl");
const LIGHT_FRAG: &str = include_str!("../shaders/light.frag.wgsl");
const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.vert.wgsl");
const COMPOSITION_FRAG: &str = include_str!("../shaders/composition.frag.wgsl");

fn batch_program(
    label: &str,
    fragment_label: &str,
    fragment: &str,
) -> Result<ShaderProgram, ShaderError> {
    let vertex = ShaderStage::compile("sprite.vert.wgsl", SPRITE_VERT, StageKind::Vertex)?;
    let fragment = ShaderStage::compile(fragment_label, fragment, StageKind::Fragment)?;
    ShaderProgram::link(label, vertex, fragment, VertexInput::Sprite)
}

/// Geometry pass: color + normal outputs.
pub fn sprite_program() -> Result<ShaderProgram, ShaderError> {
    batch_program("sprite", "sprite.frag.wgsl", SPRITE_FRAG)
}

/// Lighting pass: one quad per light.
pub fn light_program() -> Result<ShaderProgram, ShaderError> {
    batch_program("light", "light.frag.wgsl", LIGHT_FRAG)
}

/// Composition pass: full-screen triangle, no vertex buffer.
pub fn composition_program() -> Result<ShaderProgram, ShaderError> {
    let vertex =
        ShaderStage::compile("fullscreen.vert.wgsl", FULLSCREEN_VERT, StageKind::Vertex)?;
    let fragment =
        ShaderStage::compile("composition.frag.wgsl", COMPOSITION_FRAG, StageKind::Fragment)?;
    ShaderProgram::link("composition", vertex, fragment, VertexInput::None)
}
