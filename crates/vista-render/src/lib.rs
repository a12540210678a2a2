//! Frame scheduling and the per-frame tile pipeline.
//!
//! [`RenderLoop`] coalesces invalidations into at most one render per host
//! frame and records frame telemetry. [`Layer`] ties a view, a geometry and
//! a texture store together: each [`Layer::update`] selects a level, finds
//! the visible tiles, marks them in the store and produces a [`FramePlan`].

mod layer;
mod render_loop;

pub use layer::{FramePlan, Layer};
pub use render_loop::{
    FrameHost, FrameToken, InvalidationFlag, LoopState, RenderEvent, RenderLoop, Renderer,
};
