//! Report module: aggregation and rendering.

mod render;
mod stats;

pub use render::*;
pub use stats::*;
