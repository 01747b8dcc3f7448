use std::rc::Rc;

use crate::coords::{ColorRgba, Rect, Transform2D, Vec2};
use crate::render::material::{MaterialHandle, SCREEN_TRANSFORM_PARAM};

use super::{quad, BatchSink, Vertex};

/// One sprite or light quad to draw.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    /// Destination in pixels (Y up).
    pub dest: Rect,
    /// Source region in the sampled texture's own units.
    pub source: Rect,
    pub color: ColorRgba,
    pub material: MaterialHandle,
}

impl DrawRequest {
    pub fn new(dest: Rect, source: Rect, color: ColorRgba, material: &MaterialHandle) -> Self {
        Self {
            dest,
            source,
            color,
            material: Rc::clone(material),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BatchState {
    Idle,
    Accumulating,
}

/// Counters since the last `take_stats`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub draws: u32,
    pub flushes: u32,
    pub vertices: u32,
}

impl BatchStats {
    pub fn merge(&mut self, other: BatchStats) {
        self.draws += other.draws;
        self.flushes += other.flushes;
        self.vertices += other.vertices;
    }
}

/// Coalesces consecutive draws sharing a material into one draw call.
///
/// Draw order is never changed: a material switch flushes everything pending
/// with the previous material first.
#[derive(Debug)]
pub struct SpriteBatcher {
    pending: Vec<Vertex>,
    material: Option<MaterialHandle>,

    screen_size: Vec2,
    screen_transform: Transform2D,

    stats: BatchStats,
}

impl SpriteBatcher {
    pub fn new(screen_size: Vec2) -> Self {
        Self {
            pending: Vec::new(),
            material: None,
            screen_size,
            screen_transform: Transform2D::screen_to_ndc(screen_size),
            stats: BatchStats::default(),
        }
    }

    /// Buffers one quad, flushing first if `material` differs from the current one.
    pub fn draw<S: BatchSink + ?Sized>(
        &mut self,
        sink: &mut S,
        dest: Rect,
        source: Rect,
        color: ColorRgba,
        material: &MaterialHandle,
    ) {
        let same = self
            .material
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, material));

        if !same {
            self.flush(sink);
            self.material = Some(Rc::clone(material));
        }

        self.pending.extend_from_slice(&quad(dest, source, color));
        self.stats.draws += 1;
    }

    /// Sends pending vertices to `sink` as one batch.
    ///
    /// No-op when nothing is pending or no material has been set yet; the
    /// first flush of a frame usually hits this.
    pub fn flush<S: BatchSink + ?Sized>(&mut self, sink: &mut S) {
        let Some(material) = self.material.as_ref() else {
            return;
        };
        if self.pending.is_empty() {
            return;
        }

        material.set_matrix(SCREEN_TRANSFORM_PARAM, self.screen_transform.to_mat4());
        sink.draw_batch(material, &self.pending);

        self.stats.flushes += 1;
        self.stats.vertices += self.pending.len() as u32;
        log::trace!(
            "flushed {} vertices with `{}`",
            self.pending.len(),
            material.label()
        );
        self.pending.clear();
    }

    /// Recomputes the pixel → NDC transform for a `size` sized viewport.
    pub fn set_screen_size(&mut self, size: Vec2) {
        self.screen_size = size;
        self.screen_transform = Transform2D::screen_to_ndc(size);
    }

    /// Drops the held material reference.
    ///
    /// Pending vertices are discarded with it.
    pub fn clear_material(&mut self) {
        self.pending.clear();
        self.material = None;
    }

    pub fn pending(&self) -> &[Vertex] {
        &self.pending
    }

    pub fn state(&self) -> BatchState {
        if self.pending.is_empty() {
            BatchState::Idle
        } else {
            BatchState::Accumulating
        }
    }

    pub fn material(&self) -> Option<&MaterialHandle> {
        self.material.as_ref()
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    pub fn screen_transform(&self) -> Transform2D {
        self.screen_transform
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Returns the counters and resets them.
    pub fn take_stats(&mut self) -> BatchStats {
        std::mem::take(&mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{test_material, RecordingSink};

    fn batcher() -> SpriteBatcher {
        SpriteBatcher::new(Vec2::new(1280.0, 960.0))
    }

    fn sprite(i: f32) -> (Rect, Rect) {
        (
            Rect::new(i * 100.0, 0.0, 200.0, 200.0),
            Rect::new(0.0, 0.0, 1024.0, 1024.0),
        )
    }

    // ── accumulation ──────────────────────────────────────────────────────

    #[test]
    fn same_material_draws_concatenate_in_order() {
        let material = test_material("sprites");
        let mut sink = RecordingSink::default();
        let mut b = batcher();

        let mut expected = Vec::new();
        for i in 0..5 {
            let (dest, source) = sprite(i as f32);
            b.draw(&mut sink, dest, source, ColorRgba::white(), &material);
            expected.extend_from_slice(&quad(dest, source, ColorRgba::white()));
        }

        assert_eq!(b.pending(), expected.as_slice());
        assert_eq!(b.state(), BatchState::Accumulating);
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn empty_dest_is_still_buffered() {
        let material = test_material("sprites");
        let mut sink = RecordingSink::default();
        let mut b = batcher();

        b.draw(&mut sink, Rect::default(), Rect::unit(), ColorRgba::white(), &material);
        assert_eq!(b.pending().len(), 6);
    }

    // ── flushing ──────────────────────────────────────────────────────────

    #[test]
    fn material_switch_flushes_exactly_once() {
        let a = test_material("a");
        let c = test_material("c");
        let mut sink = RecordingSink::default();
        let mut b = batcher();

        let (dest, source) = sprite(0.0);
        b.draw(&mut sink, dest, source, ColorRgba::white(), &a);
        b.draw(&mut sink, dest, source, ColorRgba::white(), &a);
        b.draw(&mut sink, dest, source, ColorRgba::black(), &c);

        assert_eq!(sink.batches.len(), 1);
        assert!(Rc::ptr_eq(&sink.batches[0].material, &a));
        assert_eq!(sink.batches[0].vertices.len(), 12);
        assert_eq!(b.pending().len(), 6);
        assert!(Rc::ptr_eq(b.material().unwrap(), &c));
    }

    #[test]
    fn flush_without_material_is_noop() {
        let mut sink = RecordingSink::default();
        let mut b = batcher();
        b.flush(&mut sink);
        assert!(sink.batches.is_empty());
        assert_eq!(b.stats(), BatchStats::default());
    }

    #[test]
    fn flush_with_nothing_pending_is_noop() {
        let material = test_material("sprites");
        let mut sink = RecordingSink::default();
        let mut b = batcher();

        let (dest, source) = sprite(0.0);
        b.draw(&mut sink, dest, source, ColorRgba::white(), &material);
        b.flush(&mut sink);
        b.flush(&mut sink);

        assert_eq!(sink.batches.len(), 1);
        assert_eq!(b.state(), BatchState::Idle);
        assert_eq!(b.stats().flushes, 1);
    }

    #[test]
    fn flush_writes_screen_transform() {
        let material = test_material("sprites");
        let mut sink = RecordingSink::default();
        let mut b = batcher();
        b.set_screen_size(Vec2::new(640.0, 480.0));

        let (dest, source) = sprite(0.0);
        b.draw(&mut sink, dest, source, ColorRgba::white(), &material);
        b.flush(&mut sink);

        assert_eq!(
            material.matrix(SCREEN_TRANSFORM_PARAM),
            Some(Transform2D::screen_to_ndc(Vec2::new(640.0, 480.0)).to_mat4())
        );
    }

    // ── screen size ───────────────────────────────────────────────────────

    #[test]
    fn screen_corners_map_to_ndc() {
        let mut b = batcher();
        b.set_screen_size(Vec2::new(800.0, 600.0));
        let t = b.screen_transform();

        let lo = t.apply(Vec2::new(0.0, 0.0));
        let hi = t.apply(Vec2::new(800.0, 600.0));
        assert!((lo.x + 1.0).abs() < 1e-6 && (lo.y + 1.0).abs() < 1e-6);
        assert!((hi.x - 1.0).abs() < 1e-6 && (hi.y - 1.0).abs() < 1e-6);
        assert_eq!(b.screen_size(), Vec2::new(800.0, 600.0));
    }

    // ── ownership ─────────────────────────────────────────────────────────

    #[test]
    fn batcher_releases_previous_material_on_switch() {
        let a = test_material("a");
        let c = test_material("c");
        let mut sink = RecordingSink::default();
        let mut b = batcher();

        let (dest, source) = sprite(0.0);
        b.draw(&mut sink, dest, source, ColorRgba::white(), &a);
        assert_eq!(Rc::strong_count(&a), 2);

        b.draw(&mut sink, dest, source, ColorRgba::white(), &c);
        sink.batches.clear();
        assert_eq!(Rc::strong_count(&a), 1);

        b.clear_material();
        assert_eq!(Rc::strong_count(&c), 1);
        assert!(b.material().is_none());
    }
}
