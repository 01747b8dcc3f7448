/// Framebuffer blend configuration of a pass.
///
/// wgpu bakes blending into the pipeline, so a material keeps one pipeline per
/// blend mode it has been drawn with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Source replaces destination.
    Disabled,
    /// `src * src.a + dst * (1 - src.a)`.
    Alpha,
    /// `src * 1 + dst * 1`; overlapping lights sum.
    Additive,
}

impl BlendMode {
    pub fn state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Disabled => None,
            BlendMode::Alpha => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState { color: component, alpha: component })
            }
            BlendMode::Additive => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState { color: component, alpha: component })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_has_no_blend_state() {
        assert!(BlendMode::Disabled.state().is_none());
    }

    #[test]
    fn alpha_uses_source_alpha_factors() {
        let state = BlendMode::Alpha.state().unwrap();
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.color.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn additive_sums_source_and_destination() {
        let state = BlendMode::Additive.state().unwrap();
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(state.alpha, state.color);
    }
}
