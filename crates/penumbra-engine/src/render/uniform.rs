use crate::render::RenderCtx;

/// Size of one `mat4x4<f32>` uniform.
pub(crate) const MATRIX_SIZE: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;

const MIN_SLOTS: u64 = 64;

/// Per-frame arena for matrix uniforms.
///
/// Every bind gets its own slot, bound with a dynamic offset, so a material
/// drawn twice in one frame with different matrices keeps both values. Queue
/// writes land before the frame's commands run; a shared slot would leave
/// every draw with the last value. Slots are `stride` bytes apart to satisfy
/// `min_uniform_buffer_offset_alignment`.
pub struct UniformUpload {
    buffer: Option<wgpu::Buffer>,
    stride: u64,
    capacity: u64,
    cursor: u64,
    /// Bumped whenever `buffer` is replaced; bind groups built against the
    /// old buffer compare it to know they must be rebuilt.
    generation: u64,
}

impl UniformUpload {
    pub fn new(alignment: u32) -> Self {
        let alignment = u64::from(alignment.max(1));
        Self {
            buffer: None,
            stride: MATRIX_SIZE.div_ceil(alignment) * alignment,
            capacity: 0,
            cursor: 0,
            generation: 0,
        }
    }

    pub fn for_device(device: &wgpu::Device) -> Self {
        Self::new(device.limits().min_uniform_buffer_offset_alignment)
    }

    /// Rewinds the cursor. Offsets handed out last frame become free.
    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Slots claimed since the last `begin_frame` (or growth).
    pub fn used(&self) -> u64 {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Copies `matrix` into a fresh slot and returns its dynamic offset.
    pub fn write(&mut self, ctx: &RenderCtx<'_>, matrix: &[[f32; 4]; 4]) -> Option<u32> {
        let (offset, grow_to) = self.claim();
        if let Some(slots) = grow_to {
            log::debug!("uniform upload: growing to {slots} slots");
            self.buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("penumbra matrix ubo"),
                size: slots * self.stride,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let buffer = self.buffer.as_ref()?;
        ctx.queue.write_buffer(buffer, offset, bytemuck::cast_slice(matrix));
        u32::try_from(offset).ok()
    }

    /// Byte offset of the next slot, plus the new slot count when the buffer
    /// has to be replaced first.
    fn claim(&mut self) -> (u64, Option<u64>) {
        let mut grow_to = None;
        if self.cursor + 1 > self.capacity {
            let slots = (self.cursor + 1).next_power_of_two().max(MIN_SLOTS);
            self.capacity = slots;
            self.cursor = 0;
            self.generation = self.generation.wrapping_add(1);
            grow_to = Some(slots);
        }

        let offset = self.cursor * self.stride;
        self.cursor += 1;
        (offset, grow_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_respects_offset_alignment() {
        assert_eq!(UniformUpload::new(256).stride(), 256);
        assert_eq!(UniformUpload::new(32).stride(), 64);
        assert_eq!(UniformUpload::new(0).stride(), MATRIX_SIZE);
    }

    #[test]
    fn binds_in_one_frame_get_separate_slots() {
        let mut arena = UniformUpload::new(256);
        let (first, grow) = arena.claim();
        assert_eq!((first, grow), (0, Some(MIN_SLOTS)));

        let (second, grow) = arena.claim();
        assert_eq!((second, grow), (256, None));
        assert_eq!(arena.used(), 2);
    }

    #[test]
    fn begin_frame_reuses_slots_without_growing() {
        let mut arena = UniformUpload::new(256);
        arena.claim();
        arena.claim();
        arena.begin_frame();

        assert_eq!(arena.claim(), (0, None));
        assert_eq!(arena.generation(), 1);
    }

    #[test]
    fn overflow_replaces_buffer_and_bumps_generation() {
        let mut arena = UniformUpload::new(256);
        for _ in 0..MIN_SLOTS {
            arena.claim();
        }
        let (offset, grow) = arena.claim();
        assert_eq!((offset, grow), (0, Some(MIN_SLOTS * 2)));
        assert_eq!(arena.generation(), 2);
    }
}
