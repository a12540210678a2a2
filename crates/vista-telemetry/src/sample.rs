use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied fields merged into a [`PerfSample`].
pub type SampleExtra = Map<String, Value>;

/// Point-in-time performance snapshot.
///
/// Serialises as `{fps, droppedFrames, avgFrameTime, timestamp, ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSample {
    pub fps: f64,
    pub dropped_frames: u64,
    /// Mean frame delta in milliseconds.
    pub avg_frame_time: f64,
    /// Wall-clock time of the snapshot, milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub extra: SampleExtra,
}

impl PerfSample {
    /// Look up a caller-supplied field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Serialise to a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
