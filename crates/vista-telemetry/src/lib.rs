//! Rolling frame statistics for the viewer.
//!
//! [`Telemetry`] keeps a bounded history of frame timestamps and derives FPS,
//! dropped frames and average frame time from it. [`PerfSample`] is the
//! immutable snapshot handed to dashboards and other observers.

mod sample;
mod telemetry;

pub use sample::{PerfSample, SampleExtra};
pub use telemetry::{
    DEFAULT_HISTORY_LEN, DEFAULT_SAMPLE_WINDOW_MS, DEFAULT_TARGET_FPS, DROPPED_FRAME_FACTOR,
    Telemetry,
};
