//! Frame timing: clamped per-frame deltas and a frames-per-second counter.

mod frame_clock;

pub use frame_clock::{FpsCounter, FrameClock, FrameTime};
