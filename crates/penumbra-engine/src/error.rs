//! Typed failures raised by the render subsystem.
//!
//! Construction-time errors (`ShaderError`, `RenderError::TargetAllocation`,
//! `RenderError::Image`) are fatal to the resource being built. Bind-time
//! errors (`RenderError::MissingTexture`) only cost the affected draw.

use std::path::PathBuf;

use crate::render::StageKind;

/// Shader stage compilation or program link failure.
#[derive(thiserror::Error, Debug)]
pub enum ShaderError {
    #[error("{label}: WGSL parse error: {message}")]
    Parse { label: String, message: String },

    #[error("{label}: validation error: {message}")]
    Validation { label: String, message: String },

    #[error("{label}: no {kind:?} entry point")]
    MissingEntryPoint { label: String, kind: StageKind },

    #[error("{label}: binding {binding} declared as both `{first}` and `{second}`")]
    BindingConflict {
        label: String,
        binding: u32,
        first: String,
        second: String,
    },

    #[error("{label}: unsupported resource `{name}` (group {group}, binding {binding})")]
    UnsupportedBinding {
        label: String,
        name: String,
        group: u32,
        binding: u32,
    },
}

/// Renderer resource failures.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("cannot allocate render target `{label}` of {width}x{height} (max {max})")]
    TargetAllocation {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("failed to decode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("pixel buffer for `{label}` has {actual} bytes, expected {expected}")]
    PixelData {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("material `{material}` has no texture bound to `{param}`")]
    MissingTexture { material: String, param: String },

    #[error("material `{material}` writes {outputs} color outputs but the pass has {targets}")]
    TargetMismatch {
        material: String,
        outputs: u32,
        targets: usize,
    },

    #[error(transparent)]
    Shader(#[from] ShaderError),
}
