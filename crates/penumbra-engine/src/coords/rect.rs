use super::Vec2;

/// Axis-aligned rectangle: origin plus size.
///
/// Destination rectangles are in pixels (Y up). Source rectangles use the
/// sampled texture's own units: pixels for sprite sheets, `0..1` for light quads.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Unit square, the source region of a full-quad light.
    #[inline]
    pub const fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Rectangle of the given size centered on `center`.
    #[inline]
    pub fn centered(center: Vec2, size: Vec2) -> Self {
        Self::from_origin_size(center - size * 0.5, size)
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }
}
