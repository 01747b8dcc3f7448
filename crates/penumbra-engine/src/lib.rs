//! Penumbra engine crate.
//!
//! A 2D deferred-lighting renderer on wgpu: sprites are drawn into color and
//! normal targets, lights accumulate into a lighting target, and a final
//! pass composites both onto the window surface.
//!
//! The platform pieces (window loop, GPU device, input, timing, logging) live
//! next to the renderer so the demo only has to implement `core::App`.

pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

pub use error::{RenderError, ShaderError};
