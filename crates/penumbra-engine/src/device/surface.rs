use winit::dpi::PhysicalSize;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

pub(crate) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let wanted = |f: &&wgpu::TextureFormat| f.is_srgb() == prefer_srgb;
    formats.iter().find(wanted).or_else(|| formats.first()).copied()
}

pub(crate) fn choose_alpha_mode(
    supported: &[wgpu::CompositeAlphaMode],
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| supported.contains(m))
        .or_else(|| supported.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Stores the new size and reconfigures unless it is zero (minimized).
///
/// Returns whether the surface was reconfigured.
pub(crate) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut PhysicalSize<u32>,
    new_size: PhysicalSize<u32>,
) -> bool {
    *size = new_size;
    if new_size.width == 0 || new_size.height == 0 {
        return false;
    }

    config.width = new_size.width;
    config.height = new_size.height;
    surface.configure(device, config);
    true
}

pub(crate) fn map_surface_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn linear_format_is_preferred_by_default() {
        let formats = [F::Bgra8UnormSrgb, F::Bgra8Unorm];
        assert_eq!(choose_surface_format(&formats, false), Some(F::Bgra8Unorm));
        assert_eq!(choose_surface_format(&formats, true), Some(F::Bgra8UnormSrgb));
    }

    #[test]
    fn falls_back_to_first_format() {
        assert_eq!(choose_surface_format(&[F::Rgba8UnormSrgb], false), Some(F::Rgba8UnormSrgb));
        assert_eq!(choose_surface_format(&[], false), None);
    }

    #[test]
    fn unsupported_alpha_mode_is_replaced() {
        let supported = [wgpu::CompositeAlphaMode::Opaque];
        assert_eq!(
            choose_alpha_mode(&supported, Some(wgpu::CompositeAlphaMode::PreMultiplied)),
            wgpu::CompositeAlphaMode::Opaque
        );
        assert_eq!(choose_alpha_mode(&[], None), wgpu::CompositeAlphaMode::Auto);
    }

    #[test]
    fn surface_errors_map_to_actions() {
        assert_eq!(
            map_surface_error(&wgpu::SurfaceError::Outdated),
            SurfaceErrorAction::Reconfigured
        );
        assert_eq!(
            map_surface_error(&wgpu::SurfaceError::OutOfMemory),
            SurfaceErrorAction::Fatal
        );
        assert_eq!(
            map_surface_error(&wgpu::SurfaceError::Timeout),
            SurfaceErrorAction::SkipFrame
        );
    }
}
