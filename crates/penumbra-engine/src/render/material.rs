//! Materials: a linked shader program plus named parameter values.
//!
//! A material is shared through [`MaterialHandle`] (`Rc<Material>`). Every
//! holder keeps one strong reference; the GPU objects go away with the last
//! one. Parameter setters take `&self` so that a shared material can be
//! re-pointed at new targets without exclusive access.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::coords::Transform2D;
use crate::error::RenderError;
use crate::render::batch::Vertex;
use crate::render::blend::BlendMode;
use crate::render::shader::{ParamKind, ShaderProgram, VertexInput};
use crate::render::target::{SharedTarget, TargetId};
use crate::render::uniform::{UniformUpload, MATRIX_SIZE};
use crate::render::RenderCtx;

/// Shared ownership handle. Identity is pointer identity (`Rc::ptr_eq`).
pub type MaterialHandle = Rc<Material>;

/// Matrix parameter the batcher fills with the pixel → NDC transform.
pub const SCREEN_TRANSFORM_PARAM: &str = "screen_transform";

/// Pipeline variant selector: attachments the pass writes and how it blends.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PipelineKey {
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub blend: BlendMode,
}

impl PipelineKey {
    pub fn new(color_formats: &[wgpu::TextureFormat], blend: BlendMode) -> Self {
        Self {
            color_formats: color_formats.to_vec(),
            blend,
        }
    }
}

#[derive(Clone)]
enum ParamValue {
    Texture(Option<SharedTarget>),
    Sampler,
    Matrix([[f32; 4]; 4]),
}

/// What the cached bind group was built from.
#[derive(Debug, Clone, Eq, PartialEq)]
struct BindStamp {
    revision: u64,
    targets: Vec<(TargetId, u64)>,
    /// Generation of the uniform arena buffer, when the program has matrices.
    uniforms: Option<u64>,
}

struct MaterialGpu {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    bind_group: Option<(BindStamp, wgpu::BindGroup)>,
}

pub struct Material {
    label: String,
    program: ShaderProgram,

    values: RefCell<Vec<ParamValue>>,
    /// Bumped whenever a texture parameter is re-pointed.
    revision: Cell<u64>,
    warned_names: RefCell<HashSet<String>>,

    gpu: RefCell<Option<MaterialGpu>>,
    bound: Cell<bool>,
}

impl Material {
    /// Wraps a linked program. Textures start unset, matrices at identity.
    pub fn new(label: &str, program: ShaderProgram) -> MaterialHandle {
        let values = program
            .params()
            .iter()
            .map(|p| match p.kind {
                ParamKind::Texture => ParamValue::Texture(None),
                ParamKind::Sampler => ParamValue::Sampler,
                ParamKind::Matrix => ParamValue::Matrix(Transform2D::IDENTITY.to_mat4()),
            })
            .collect();

        log::debug!(
            "created material `{label}` from program `{}` ({} params)",
            program.label(),
            program.params().len()
        );

        Rc::new(Self {
            label: label.to_string(),
            program,
            values: RefCell::new(values),
            revision: Cell::new(0),
            warned_names: RefCell::new(HashSet::new()),
            gpu: RefCell::new(None),
            bound: Cell::new(false),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Whether `bind` ran without a matching `unbind` yet.
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Points a texture parameter at `target`.
    ///
    /// Returns `false` (and changes nothing) when the program declares no
    /// texture of that name.
    pub fn set_texture(&self, name: &str, target: &SharedTarget) -> bool {
        let Some(index) = self.param_index(name, ParamKind::Texture) else {
            return false;
        };
        self.values.borrow_mut()[index] = ParamValue::Texture(Some(Rc::clone(target)));
        self.revision.set(self.revision.get().wrapping_add(1));
        true
    }

    /// Sets a matrix parameter. Takes effect on the next `bind`; draws already
    /// recorded keep the value they were bound with.
    pub fn set_matrix(&self, name: &str, value: [[f32; 4]; 4]) -> bool {
        let Some(index) = self.param_index(name, ParamKind::Matrix) else {
            return false;
        };
        self.values.borrow_mut()[index] = ParamValue::Matrix(value);
        true
    }

    pub fn texture(&self, name: &str) -> Option<SharedTarget> {
        let index = self.program.params().iter().position(|p| p.name == name)?;
        match &self.values.borrow()[index] {
            ParamValue::Texture(t) => t.clone(),
            _ => None,
        }
    }

    pub fn matrix(&self, name: &str) -> Option<[[f32; 4]; 4]> {
        let index = self.program.params().iter().position(|p| p.name == name)?;
        match &self.values.borrow()[index] {
            ParamValue::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    /// Checks that the material can be drawn with `key` without touching the GPU.
    pub(crate) fn check_ready(&self, key: &PipelineKey) -> Result<(), RenderError> {
        let outputs = self.program.fragment().color_outputs();
        if outputs as usize != key.color_formats.len() {
            return Err(RenderError::TargetMismatch {
                material: self.label.clone(),
                outputs,
                targets: key.color_formats.len(),
            });
        }

        let values = self.values.borrow();
        for (slot, value) in self.program.params().iter().zip(values.iter()) {
            if matches!(value, ParamValue::Texture(None)) {
                return Err(RenderError::MissingTexture {
                    material: self.label.clone(),
                    param: slot.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Makes the material current on `pass`.
    ///
    /// Creates GPU objects on first use, copies matrix parameters into fresh
    /// `uniforms` slots and rebuilds the bind group when a texture changed or
    /// was reallocated.
    pub fn bind(
        &self,
        ctx: &RenderCtx<'_>,
        pass: &mut wgpu::RenderPass<'_>,
        key: &PipelineKey,
        uniforms: &mut UniformUpload,
    ) -> Result<(), RenderError> {
        self.check_ready(key)?;

        if self.bound.get() {
            log::warn!("material `{}` bound twice without unbind", self.label);
        }

        self.ensure_gpu(ctx);
        let mut gpu_slot = self.gpu.borrow_mut();
        let Some(gpu) = gpu_slot.as_mut() else {
            return Ok(());
        };

        if !gpu.pipelines.contains_key(key) {
            let pipeline = self.create_pipeline(ctx, gpu, key);
            gpu.pipelines.insert(key.clone(), pipeline);
        }

        let Some(offsets) = self.upload_matrices(ctx, uniforms) else {
            return Ok(());
        };
        self.ensure_bind_group(ctx, gpu, uniforms);

        let Some(pipeline) = gpu.pipelines.get(key) else { return Ok(()) };
        let Some((_, bind_group)) = gpu.bind_group.as_ref() else { return Ok(()) };

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &offsets);
        self.bound.set(true);
        Ok(())
    }

    /// Ends the current bind. Pipeline and bind group state is per render pass
    /// in wgpu, so only the bound flag needs resetting.
    pub fn unbind(&self) {
        self.bound.set(false);
    }

    fn param_index(&self, name: &str, kind: ParamKind) -> Option<usize> {
        let found = self
            .program
            .params()
            .iter()
            .position(|p| p.name == name && p.kind == kind);

        if found.is_none() && self.warned_names.borrow_mut().insert(name.to_string()) {
            log::debug!(
                "material `{}`: no {kind:?} parameter `{name}`; ignored",
                self.label
            );
        }
        found
    }

    fn ensure_gpu(&self, ctx: &RenderCtx<'_>) {
        if self.gpu.borrow().is_some() {
            return;
        }

        let vertex_module = self.program.vertex().create_module(ctx.device);
        let fragment_module = self.program.fragment().create_module(ctx.device);

        let entries: Vec<wgpu::BindGroupLayoutEntry> = self
            .program
            .params()
            .iter()
            .map(|p| wgpu::BindGroupLayoutEntry {
                binding: p.binding,
                visibility: p.visibility,
                ty: match p.kind {
                    ParamKind::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    ParamKind::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                    ParamKind::Matrix => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(MATRIX_SIZE),
                    },
                },
                count: None,
            })
            .collect();

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} bgl", self.label)),
                    entries: &entries,
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} pipeline layout", self.label)),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} sampler", self.label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::debug!("material `{}`: created GPU objects", self.label);

        *self.gpu.borrow_mut() = Some(MaterialGpu {
            vertex_module,
            fragment_module,
            bind_group_layout,
            pipeline_layout,
            sampler,
            pipelines: HashMap::new(),
            bind_group: None,
        });
    }

    fn create_pipeline(
        &self,
        ctx: &RenderCtx<'_>,
        gpu: &MaterialGpu,
        key: &PipelineKey,
    ) -> wgpu::RenderPipeline {
        let buffers: &[wgpu::VertexBufferLayout<'static>] = match self.program.vertex_input() {
            VertexInput::Sprite => &[Vertex::LAYOUT],
            VertexInput::None => &[],
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: key.blend.state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        log::debug!(
            "material `{}`: pipeline for {:?} ({:?})",
            self.label,
            key.color_formats,
            key.blend
        );

        ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} pipeline", self.label)),
            layout: Some(&gpu.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &gpu.vertex_module,
                entry_point: Some(self.program.vertex().entry_point()),
                compilation_options: Default::default(),
                buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &gpu.fragment_module,
                entry_point: Some(self.program.fragment().entry_point()),
                compilation_options: Default::default(),
                targets: &targets,
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    /// Writes every matrix parameter into its own arena slot.
    ///
    /// Returns the dynamic offsets in binding order, as `set_bind_group`
    /// expects them.
    pub(crate) fn upload_matrices(
        &self,
        ctx: &RenderCtx<'_>,
        uniforms: &mut UniformUpload,
    ) -> Option<Vec<u32>> {
        self.values
            .borrow()
            .iter()
            .filter_map(|v| match v {
                ParamValue::Matrix(m) => Some(m),
                _ => None,
            })
            .map(|m| uniforms.write(ctx, m))
            .collect()
    }

    fn has_matrices(&self) -> bool {
        self.program.params().iter().any(|p| p.kind == ParamKind::Matrix)
    }

    fn ensure_bind_group(
        &self,
        ctx: &RenderCtx<'_>,
        gpu: &mut MaterialGpu,
        uniforms: &UniformUpload,
    ) {
        let values = self.values.borrow();

        let targets: Vec<_> = values
            .iter()
            .filter_map(|v| match v {
                ParamValue::Texture(Some(t)) => Some(t.borrow()),
                _ => None,
            })
            .collect();

        let stamp = BindStamp {
            revision: self.revision.get(),
            targets: targets.iter().map(|t| (t.handle(), t.generation())).collect(),
            uniforms: self.has_matrices().then(|| uniforms.generation()),
        };
        if matches!(&gpu.bind_group, Some((cached, _)) if *cached == stamp) {
            return;
        }

        let mut next_target = targets.iter();
        let mut entries = Vec::with_capacity(values.len());
        for (slot, value) in self.program.params().iter().zip(values.iter()) {
            let resource = match value {
                ParamValue::Texture(_) => match next_target.next() {
                    Some(t) => wgpu::BindingResource::TextureView(t.view()),
                    None => return,
                },
                ParamValue::Sampler => wgpu::BindingResource::Sampler(&gpu.sampler),
                ParamValue::Matrix(_) => match uniforms.buffer() {
                    Some(buffer) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(MATRIX_SIZE),
                    }),
                    None => return,
                },
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource,
            });
        }

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} bind group", self.label)),
            layout: &gpu.bind_group_layout,
            entries: &entries,
        });

        log::trace!("material `{}`: rebuilt bind group", self.label);
        gpu.bind_group = Some((stamp, bind_group));
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Material")
            .field("label", &self.label)
            .field("program", &self.program.label())
            .field("bound", &self.bound.get())
            .finish()
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        log::debug!("released material `{}`", self.label);
    }
}
