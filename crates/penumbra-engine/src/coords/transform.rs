use super::Vec2;

/// 2D affine transform.
///
/// Stored column-major as the images of the X and Y axes plus a translation;
/// the implicit last row is `(0, 0, 1)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform2D {
    pub x_axis: Vec2,
    pub y_axis: Vec2,
    pub translation: Vec2,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        x_axis: Vec2::new(1.0, 0.0),
        y_axis: Vec2::new(0.0, 1.0),
        translation: Vec2::new(0.0, 0.0),
    };

    /// Maps pixel space `[0, w] × [0, h]` onto NDC `[-1, 1] × [-1, 1]`.
    ///
    /// Y is not flipped: pixel `y = 0` lands on the bottom edge. Non-positive
    /// sizes are treated as `1` so the matrix stays finite.
    pub fn screen_to_ndc(size: Vec2) -> Self {
        let w = if size.x > 0.0 { size.x } else { 1.0 };
        let h = if size.y > 0.0 { size.y } else { 1.0 };
        Self {
            x_axis: Vec2::new(2.0 / w, 0.0),
            y_axis: Vec2::new(0.0, 2.0 / h),
            translation: Vec2::new(-1.0, -1.0),
        }
    }

    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        self.x_axis * p.x + self.y_axis * p.y + self.translation
    }

    /// Column-major 4×4 matrix for a `mat4x4<f32>` uniform.
    pub fn to_mat4(self) -> [[f32; 4]; 4] {
        [
            [self.x_axis.x, self.x_axis.y, 0.0, 0.0],
            [self.y_axis.x, self.y_axis.y, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [self.translation.x, self.translation.y, 0.0, 1.0],
        ]
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5
    }

    fn mat4_apply(m: [[f32; 4]; 4], p: Vec2) -> Vec2 {
        let v = [p.x, p.y, 0.0, 1.0];
        let mut out = [0.0f32; 4];
        for (col, &s) in m.iter().zip(v.iter()) {
            for row in 0..4 {
                out[row] += col[row] * s;
            }
        }
        Vec2::new(out[0], out[1])
    }

    #[test]
    fn screen_corners_map_to_ndc_corners() {
        let t = Transform2D::screen_to_ndc(Vec2::new(1280.0, 960.0));
        assert!(close(t.apply(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, -1.0)));
        assert!(close(t.apply(Vec2::new(1280.0, 960.0)), Vec2::new(1.0, 1.0)));
        assert!(close(t.apply(Vec2::new(640.0, 480.0)), Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn mat4_matches_apply() {
        let t = Transform2D::screen_to_ndc(Vec2::new(800.0, 600.0));
        for p in [Vec2::new(0.0, 0.0), Vec2::new(800.0, 600.0), Vec2::new(200.0, 450.0)] {
            assert!(close(mat4_apply(t.to_mat4(), p), t.apply(p)));
        }
    }

    #[test]
    fn degenerate_size_stays_finite() {
        let t = Transform2D::screen_to_ndc(Vec2::new(0.0, -3.0));
        assert!(t.apply(Vec2::new(5.0, 5.0)).is_finite());
    }

    #[test]
    fn identity_is_default() {
        let p = Vec2::new(12.0, -4.0);
        assert_eq!(Transform2D::default().apply(p), p);
    }
}
