//! Shader stages and linked programs.
//!
//! Stages are WGSL sources validated with naga at construction, so a broken
//! shader fails before any GPU object exists. The wgpu modules themselves are
//! created lazily by the owning material on first bind.
//!
//! Resource convention: every stage declares its resources in bind group 0.
//! Supported resources are `texture_2d<f32>`, non-comparison `sampler` and
//! `var<uniform> name: mat4x4<f32>`.

use std::collections::BTreeMap;

use crate::error::ShaderError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }

    fn visibility(self) -> wgpu::ShaderStages {
        match self {
            StageKind::Vertex => wgpu::ShaderStages::VERTEX,
            StageKind::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

/// Kind of a material parameter, as declared by the shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ParamKind {
    Texture,
    Sampler,
    Matrix,
}

/// A reflected group-0 resource binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub binding: u32,
    pub kind: ParamKind,
    pub visibility: wgpu::ShaderStages,
}

/// Vertex buffer layout a program expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexInput {
    /// One buffer of batch [`Vertex`](crate::render::batch::Vertex) data.
    Sprite,
    /// No buffers; geometry comes from `vertex_index`.
    None,
}

/// One compiled, validated shader stage.
#[derive(Debug)]
pub struct ShaderStage {
    label: String,
    kind: StageKind,
    source: String,
    entry_point: String,
    params: Vec<ParamSlot>,
    color_outputs: u32,
}

impl ShaderStage {
    /// Parses and validates `source`, picking the first entry point of `kind`.
    pub fn compile(label: &str, source: &str, kind: StageKind) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_string(),
            message: e.to_string(),
        })?;

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == kind.naga_stage())
            .ok_or_else(|| ShaderError::MissingEntryPoint {
                label: label.to_string(),
                kind,
            })?;

        let color_outputs = match kind {
            StageKind::Vertex => 0,
            StageKind::Fragment => count_color_outputs(&module, entry),
        };
        let entry_point = entry.name.clone();
        let params = reflect_params(label, &module, kind.visibility())?;

        log::debug!(
            "compiled {kind:?} stage `{label}` (entry `{entry_point}`, {} params)",
            params.len()
        );

        Ok(Self {
            label: label.to_string(),
            kind,
            source: source.to_string(),
            entry_point,
            params,
            color_outputs,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Number of `@location` outputs of a fragment stage (zero for vertex).
    pub fn color_outputs(&self) -> u32 {
        self.color_outputs
    }

    pub(crate) fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(self.source.as_str().into()),
        })
    }
}

/// A vertex stage and a fragment stage with a merged parameter table.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    vertex: ShaderStage,
    fragment: ShaderStage,
    vertex_input: VertexInput,
    params: Vec<ParamSlot>,
}

impl ShaderProgram {
    /// Links two stages.
    ///
    /// A binding index declared by both stages must agree on name and kind;
    /// its visibility becomes the union of both stages.
    pub fn link(
        label: &str,
        vertex: ShaderStage,
        fragment: ShaderStage,
        vertex_input: VertexInput,
    ) -> Result<Self, ShaderError> {
        if vertex.kind != StageKind::Vertex {
            return Err(ShaderError::MissingEntryPoint {
                label: vertex.label.clone(),
                kind: StageKind::Vertex,
            });
        }
        if fragment.kind != StageKind::Fragment {
            return Err(ShaderError::MissingEntryPoint {
                label: fragment.label.clone(),
                kind: StageKind::Fragment,
            });
        }

        let mut merged: BTreeMap<u32, ParamSlot> = BTreeMap::new();
        for slot in vertex.params.iter().chain(fragment.params.iter()) {
            match merged.get_mut(&slot.binding) {
                None => {
                    merged.insert(slot.binding, slot.clone());
                }
                Some(existing) if existing.name == slot.name && existing.kind == slot.kind => {
                    existing.visibility |= slot.visibility;
                }
                Some(existing) => {
                    return Err(ShaderError::BindingConflict {
                        label: label.to_string(),
                        binding: slot.binding,
                        first: existing.name.clone(),
                        second: slot.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            label: label.to_string(),
            vertex,
            fragment,
            vertex_input,
            params: merged.into_values().collect(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex(&self) -> &ShaderStage {
        &self.vertex
    }

    pub fn fragment(&self) -> &ShaderStage {
        &self.fragment
    }

    pub fn vertex_input(&self) -> VertexInput {
        self.vertex_input
    }

    /// Parameters ordered by binding index.
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSlot> {
        self.params.iter().find(|p| p.name == name)
    }
}

fn reflect_params(
    label: &str,
    module: &naga::Module,
    visibility: wgpu::ShaderStages,
) -> Result<Vec<ParamSlot>, ShaderError> {
    let mut params = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = var.binding.as_ref() else { continue };
        let name = var
            .name
            .clone()
            .unwrap_or_else(|| format!("binding{}", binding.binding));

        let kind = match (var.space, &module.types[var.ty].inner) {
            (
                naga::AddressSpace::Handle,
                naga::TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    class:
                        naga::ImageClass::Sampled {
                            kind: naga::ScalarKind::Float,
                            multi: false,
                        },
                },
            ) => Some(ParamKind::Texture),
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false }) => {
                Some(ParamKind::Sampler)
            }
            (
                naga::AddressSpace::Uniform,
                naga::TypeInner::Matrix {
                    columns: naga::VectorSize::Quad,
                    rows: naga::VectorSize::Quad,
                    scalar,
                },
            ) if *scalar == naga::Scalar::F32 => Some(ParamKind::Matrix),
            _ => None,
        };

        let Some(kind) = kind.filter(|_| binding.group == 0) else {
            return Err(ShaderError::UnsupportedBinding {
                label: label.to_string(),
                name,
                group: binding.group,
                binding: binding.binding,
            });
        };

        params.push(ParamSlot {
            name,
            binding: binding.binding,
            kind,
            visibility,
        });
    }

    params.sort_by_key(|p| p.binding);
    Ok(params)
}

fn count_color_outputs(module: &naga::Module, entry: &naga::EntryPoint) -> u32 {
    let Some(result) = entry.function.result.as_ref() else { return 0 };

    if let Some(binding) = result.binding.as_ref() {
        return u32::from(matches!(binding, naga::Binding::Location { .. }));
    }

    match &module.types[result.ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter(|m| matches!(m.binding, Some(naga::Binding::Location { .. })))
            .count() as u32,
        _ => 0,
    }
}
