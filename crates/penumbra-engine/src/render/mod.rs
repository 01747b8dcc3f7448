//! GPU rendering subsystem.
//!
//! Leaf-first: render targets, shader programs, materials, the sprite batcher
//! and the deferred frame orchestrator built on top of them.
//!
//! Convention:
//! - CPU geometry is in pixels, origin bottom-left, +Y up.
//! - Vertex shaders map to NDC through the `screen_transform` uniform.

pub mod batch;
mod blend;
mod ctx;
pub mod deferred;
mod material;
mod shader;
mod target;
mod uniform;

pub use blend::BlendMode;
pub use ctx::{FrameTarget, RenderCtx};
pub use material::{Material, MaterialHandle, PipelineKey, SCREEN_TRANSFORM_PARAM};
pub use shader::{ParamKind, ParamSlot, ShaderProgram, ShaderStage, StageKind, VertexInput};
pub use target::{RenderTarget, SharedTarget, TargetId, TARGET_FORMAT};
pub use uniform::UniformUpload;

#[cfg(test)]
pub(crate) mod test_support {
    use super::batch::{BatchSink, Vertex};
    use super::*;

    pub const SPRITE_VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> screen_transform: mat4x4<f32>;

struct VsIn {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(v: VsIn) -> VsOut {
    var out: VsOut;
    out.clip = screen_transform * vec4<f32>(v.position, 0.0, 1.0);
    out.uv = v.uv;
    out.color = v.color;
    return out;
}
"#;

    pub const SPRITE_FRAGMENT: &str = r#"
@group(0) @binding(1) var color_map: texture_2d<f32>;
@group(0) @binding(2) var color_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>, @location(1) color: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(color_map, color_sampler, uv) * color;
}
"#;

    /// Geometry-pass fragment: color and normal outputs.
    pub const GBUFFER_FRAGMENT: &str = r#"
@group(0) @binding(1) var color_map: texture_2d<f32>;
@group(0) @binding(2) var normal_map: texture_2d<f32>;
@group(0) @binding(3) var gbuffer_sampler: sampler;

struct GBuffer {
    @location(0) color: vec4<f32>,
    @location(1) normal: vec4<f32>,
};

@fragment
fn fs_main(@location(0) uv: vec2<f32>, @location(1) tint: vec4<f32>) -> GBuffer {
    let st = uv / vec2<f32>(textureDimensions(color_map));
    var out: GBuffer;
    out.color = textureSample(color_map, gbuffer_sampler, st) * tint;
    out.normal = textureSample(normal_map, gbuffer_sampler, st);
    return out;
}
"#;

    /// Lighting-pass fragment reading the geometry normals.
    pub const LIGHT_FRAGMENT: &str = r#"
@group(0) @binding(1) var normal_screen: texture_2d<f32>;

@fragment
fn fs_main(
    @builtin(position) frag: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
) -> @location(0) vec4<f32> {
    let n = textureLoad(normal_screen, vec2<i32>(frag.xy), 0);
    return vec4<f32>(color.rgb * n.a * (1.0 - length(uv - vec2<f32>(0.5, 0.5))), 1.0);
}
"#;

    pub const FULLSCREEN_VERTEX: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    return vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
}
"#;

    pub const COMPOSITION_FRAGMENT: &str = r#"
@group(0) @binding(0) var color_screen: texture_2d<f32>;
@group(0) @binding(1) var light_screen: texture_2d<f32>;

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag.xy);
    let color = textureLoad(color_screen, texel, 0);
    let light = textureLoad(light_screen, texel, 0);
    return vec4<f32>(color.rgb * light.rgb, 1.0);
}
"#;

    /// Compiles and links a program from the sources above. No GPU needed.
    pub fn test_program(
        label: &str,
        vertex: &str,
        fragment: &str,
        input: VertexInput,
    ) -> ShaderProgram {
        let vertex = ShaderStage::compile(label, vertex, StageKind::Vertex)
            .expect("test vertex stage");
        let fragment = ShaderStage::compile(label, fragment, StageKind::Fragment)
            .expect("test fragment stage");
        ShaderProgram::link(label, vertex, fragment, input).expect("test program")
    }

    /// Headless device, or `None` when the machine has no usable adapter.
    ///
    /// GPU tests return early on `None`; the notice keeps that visible.
    pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let device = pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()
        });
        if device.is_none() {
            eprintln!("no GPU adapter available; skipping GPU-backed test");
        }
        device
    }

    /// A sprite material compiled from the WGSL above. No GPU needed.
    pub fn test_material(label: &str) -> MaterialHandle {
        let program = test_program(label, SPRITE_VERTEX, SPRITE_FRAGMENT, VertexInput::Sprite);
        Material::new(label, program)
    }

    pub struct RecordedBatch {
        pub material: MaterialHandle,
        pub vertices: Vec<Vertex>,
    }

    /// Records every batch instead of drawing it.
    #[derive(Default)]
    pub struct RecordingSink {
        pub batches: Vec<RecordedBatch>,
    }

    impl BatchSink for RecordingSink {
        fn draw_batch(&mut self, material: &MaterialHandle, vertices: &[Vertex]) {
            self.batches.push(RecordedBatch {
                material: std::rc::Rc::clone(material),
                vertices: vertices.to_vec(),
            });
        }
    }
}
