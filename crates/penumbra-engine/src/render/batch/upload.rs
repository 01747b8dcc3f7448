use std::ops::Range;

use crate::render::RenderCtx;

use super::Vertex;

const MIN_CAPACITY: u64 = 1024;
const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;

/// Where a batch lands inside the upload buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Claim {
    first: u64,
    /// New capacity (in vertices) when the buffer must be reallocated first.
    grow_to: Option<u64>,
}

/// Growable GPU vertex buffer shared by all flushes of a frame.
///
/// Flushes recorded into one command encoder are only executed at submit, so
/// each one gets its own region; the cursor rewinds at `begin_frame`. When a
/// batch does not fit, a larger buffer replaces the current one and the
/// cursor starts over in it (wgpu keeps the old buffer alive for passes that
/// already reference it).
#[derive(Default)]
pub struct VertexUpload {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    cursor: u64,
}

impl VertexUpload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewinds the cursor. Contents from earlier frames are not kept.
    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    /// Capacity in vertices (zero before the first upload).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Copies `vertices` into the next free region and returns the buffer plus
    /// the byte range to bind.
    pub fn write(
        &mut self,
        ctx: &RenderCtx<'_>,
        vertices: &[Vertex],
    ) -> Option<(&wgpu::Buffer, Range<wgpu::BufferAddress>)> {
        if vertices.is_empty() {
            return None;
        }

        let claim = self.claim(vertices.len() as u64);
        if let Some(capacity) = claim.grow_to {
            log::debug!("vertex upload: growing to {capacity} vertices");
            self.buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("penumbra batch vbo"),
                size: capacity * VERTEX_SIZE,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let buffer = self.buffer.as_ref()?;
        let start = claim.first * VERTEX_SIZE;
        let end = start + vertices.len() as u64 * VERTEX_SIZE;
        ctx.queue.write_buffer(buffer, start, bytemuck::cast_slice(vertices));
        Some((buffer, start..end))
    }

    fn claim(&mut self, count: u64) -> Claim {
        let mut grow_to = None;
        if self.cursor + count > self.capacity {
            // Size for everything this frame needed so far; the next frame fits.
            let capacity = (self.cursor + count).next_power_of_two().max(MIN_CAPACITY);
            self.capacity = capacity;
            self.cursor = 0;
            grow_to = Some(capacity);
        }

        let first = self.cursor;
        self.cursor += count;
        Claim { first, grow_to }
    }
}
