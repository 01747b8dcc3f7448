//! Sprite batching: draw requests become vertex runs, one draw call per
//! contiguous run of the same material.

mod batcher;
mod sink;
mod upload;
mod vertex;

pub use batcher::{BatchState, BatchStats, DrawRequest, SpriteBatcher};
pub use sink::{BatchSink, PassSink};
pub use upload::VertexUpload;
pub use vertex::{quad, Vertex};
