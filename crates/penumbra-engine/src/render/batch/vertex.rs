use bytemuck::{Pod, Zeroable};

use crate::coords::{ColorRgba, Rect};

/// One batch vertex: pixel position, texture coordinate, RGBA tint.
///
/// Shader locations: 0 = position, 1 = uv, 2 = color.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // uv
        2 => Float32x4  // color
    ];

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRS,
    };

    #[inline]
    pub fn new(position: [f32; 2], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self { position, uv, color }
    }
}

/// Two triangles covering `dest`, mapping its corners onto `source`.
pub fn quad(dest: Rect, source: Rect, color: ColorRgba) -> [Vertex; 6] {
    let (x, y) = (dest.origin.x, dest.origin.y);
    let (w, h) = (dest.size.x, dest.size.y);
    let (u0, v0) = (source.origin.x, source.origin.y);
    let (u1, v1) = (u0 + source.size.x, v0 + source.size.y);
    let c = color.to_array();

    [
        Vertex::new([x, y], [u0, v0], c),
        Vertex::new([x + w, y], [u1, v0], c),
        Vertex::new([x, y + h], [u0, v1], c),
        Vertex::new([x + w, y], [u1, v0], c),
        Vertex::new([x, y + h], [u0, v1], c),
        Vertex::new([x + w, y + h], [u1, v1], c),
    ]
}
