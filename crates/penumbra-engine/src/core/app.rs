use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

use crate::device::Gpu;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by `window::Runtime`.
pub trait App {
    /// Called for every window event, after input state has been updated.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called after the surface was reconfigured for `size` (physical pixels).
    ///
    /// Not called for zero sizes; a minimized window keeps its old resources.
    fn on_resize(&mut self, gpu: &Gpu<'_>, size: PhysicalSize<u32>) -> AppControl {
        let _ = (gpu, size);
        AppControl::Continue
    }

    /// Called once per redraw.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
