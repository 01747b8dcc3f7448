//! The deferred lighting frame: pass list, framebuffers and the orchestrator.

mod framebuffer;
mod pass;
mod renderer;

pub use framebuffer::Framebuffer;
pub use pass::{DrawSource, PassDesc, PassTarget, DEFERRED_PASSES};
pub use renderer::{
    submit_batched, DeferredRenderer, FrameDraws, FrameStats, COMPOSITE_COLOR_PARAM,
    COMPOSITE_LIGHT_PARAM, LIGHT_NORMAL_PARAM,
};
