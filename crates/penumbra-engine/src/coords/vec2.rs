use core::ops::{Add, Mul, Sub};

/// 2D vector in pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    /// Converts between Y-down window space and Y-up world space.
    ///
    /// `height` is the viewport height in the same units as `self`.
    #[inline]
    pub fn flip_y(self, height: f32) -> Self {
        Self::new(self.x, height - self.y)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_y_mirrors_around_height() {
        assert_eq!(Vec2::new(10.0, 0.0).flip_y(960.0), Vec2::new(10.0, 960.0));
        assert_eq!(Vec2::new(10.0, 960.0).flip_y(960.0), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn flip_y_twice_is_identity() {
        let p = Vec2::new(3.5, 120.25);
        assert_eq!(p.flip_y(480.0).flip_y(480.0), p);
    }
}
