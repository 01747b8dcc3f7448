//! GPU device + surface management.
//!
//! - `Gpu` creates the wgpu Instance/Adapter/Device/Queue and owns the surface
//! - `GpuFrame` is one acquired swapchain image with its command encoder
//! - surface helpers pick formats and map surface errors to actions

mod frame;
mod gpu;
mod init;
mod surface;

pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
