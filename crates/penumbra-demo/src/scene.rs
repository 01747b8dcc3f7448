//! Per-frame draw lists of the demo scene, in pixels with +Y up.

use penumbra_engine::coords::{ColorRgba, Rect, Vec2};
use penumbra_engine::render::MaterialHandle;
use penumbra_engine::render::batch::DrawRequest;

use crate::config::SceneConfig;

/// The sprite grid, column-major like the classic demo.
pub fn push_sprites(
    out: &mut Vec<DrawRequest>,
    config: &SceneConfig,
    source: Rect,
    material: &MaterialHandle,
) {
    for i in 0..config.sprite_columns {
        for j in 0..config.sprite_rows {
            let dest = Rect::new(
                i as f32 * config.sprite_spacing,
                j as f32 * config.sprite_spacing,
                config.sprite_size,
                config.sprite_size,
            );
            out.push(DrawRequest::new(dest, source, ColorRgba::white(), material));
        }
    }
}

/// Red, green and blue lights circling around `(orbit, orbit / 2)`.
pub fn push_animated_lights(
    out: &mut Vec<DrawRequest>,
    config: &SceneConfig,
    t: f32,
    material: &MaterialHandle,
) {
    let (s, c) = t.sin_cos();
    let r = config.light_orbit;
    let base = Vec2::new(r, r * 0.5);
    let size = config.light_size;

    let lights = [
        (Vec2::new(base.x + s * r, base.y + c * r), ColorRgba::new(1.0, 0.0, 0.0, 1.0)),
        (Vec2::new(base.x, base.y - c * r), ColorRgba::new(0.0, 1.0, 0.0, 1.0)),
        (Vec2::new(base.x - s * r, base.y), ColorRgba::new(0.0, 0.0, 1.0, 1.0)),
    ];
    for (origin, color) in lights {
        out.push(DrawRequest::new(
            Rect::from_origin_size(origin, Vec2::splat(size)),
            Rect::unit(),
            color,
            material,
        ));
    }
}

/// Dense grid of small white lights.
pub fn push_light_grid(
    out: &mut Vec<DrawRequest>,
    config: &SceneConfig,
    material: &MaterialHandle,
) {
    out.reserve((config.dense_columns * config.dense_rows) as usize);
    for i in 0..config.dense_columns {
        for j in 0..config.dense_rows {
            let dest = Rect::new(
                i as f32 * config.dense_spacing,
                j as f32 * config.dense_spacing,
                config.dense_size,
                config.dense_size,
            );
            out.push(DrawRequest::new(dest, Rect::unit(), ColorRgba::white(), material));
        }
    }
}

/// White light centered on the pointer.
///
/// `pointer` is in window pixels (Y down); `height` is the surface height.
pub fn push_cursor_light(
    out: &mut Vec<DrawRequest>,
    config: &SceneConfig,
    pointer: (f32, f32),
    height: f32,
    material: &MaterialHandle,
) {
    let center = Vec2::new(pointer.0, pointer.1).flip_y(height);
    out.push(DrawRequest::new(
        Rect::centered(center, Vec2::splat(config.light_size)),
        Rect::unit(),
        ColorRgba::white(),
        material,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::light_program;
    use penumbra_engine::render::Material;

    fn material() -> MaterialHandle {
        Material::new("light", light_program().unwrap())
    }

    #[test]
    fn sprite_grid_matches_classic_layout() {
        let config = SceneConfig::default();
        let m = material();
        let mut out = Vec::new();
        push_sprites(&mut out, &config, Rect::new(0.0, 0.0, 1024.0, 1024.0), &m);

        assert_eq!(out.len(), 48);
        assert_eq!(out[0].dest, Rect::new(0.0, 0.0, 200.0, 200.0));
        assert_eq!(out[1].dest, Rect::new(0.0, 100.0, 200.0, 200.0));
        assert_eq!(out[47].dest, Rect::new(700.0, 500.0, 200.0, 200.0));
        assert!(out.iter().all(|d| d.source.size == Vec2::new(1024.0, 1024.0)));
    }

    #[test]
    fn animated_lights_start_positions() {
        let config = SceneConfig::default();
        let m = material();
        let mut out = Vec::new();
        push_animated_lights(&mut out, &config, 0.0, &m);

        let origins: Vec<_> = out.iter().map(|d| d.dest.origin).collect();
        assert_eq!(
            origins,
            vec![
                Vec2::new(200.0, 300.0),
                Vec2::new(200.0, -100.0),
                Vec2::new(200.0, 100.0),
            ]
        );
        assert!(out.iter().all(|d| d.source == Rect::unit()));
        assert_eq!(out[0].color, ColorRgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn light_grid_has_19200_lights() {
        let config = SceneConfig::default();
        let m = material();
        let mut out = Vec::new();
        push_light_grid(&mut out, &config, &m);

        assert_eq!(out.len(), 19_200);
        assert_eq!(out[1].dest, Rect::new(0.0, 8.0, 16.0, 16.0));
    }

    #[test]
    fn cursor_light_flips_pointer_y() {
        let config = SceneConfig::default();
        let m = material();
        let mut out = Vec::new();
        push_cursor_light(&mut out, &config, (100.0, 10.0), 960.0, &m);

        assert_eq!(out[0].dest.center(), Vec2::new(100.0, 950.0));
        assert_eq!(out[0].dest.size, Vec2::splat(400.0));
    }
}
