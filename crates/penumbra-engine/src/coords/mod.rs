//! Coordinate and geometry types shared by the batcher, the passes and the demo.
//!
//! Canonical CPU space for draw requests:
//! - physical pixels
//! - origin bottom-left, +X right, +Y up
//!
//! Window input arrives with +Y down; callers flip it with [`Vec2::flip_y`]
//! before feeding it into world calculations. The batcher maps pixel space to
//! NDC through a [`Transform2D`] uniform.

mod color;
mod rect;
mod transform;
mod vec2;

pub use color::ColorRgba;
pub use rect::Rect;
pub use transform::Transform2D;
pub use vec2::Vec2;
