use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;
use vista_config::TelemetryConfig;

use crate::sample::{PerfSample, SampleExtra, unix_millis};

pub const DEFAULT_TARGET_FPS: f64 = 60.0;
pub const DEFAULT_SAMPLE_WINDOW_MS: f64 = 500.0;
pub const DEFAULT_HISTORY_LEN: usize = 120;

/// A delta longer than this many nominal intervals counts as dropped frames.
pub const DROPPED_FRAME_FACTOR: f64 = 1.5;

/// Rolling frame-timing statistics.
///
/// Timestamps are milliseconds on any monotonic clock. A timestamp earlier
/// than the previous one restarts the timeline without touching counters.
#[derive(Debug, Clone)]
pub struct Telemetry {
    history: VecDeque<f64>,
    history_len: usize,
    window_ms: f64,
    frame_interval_ms: f64,
    dropped_frames: u64,
    frame_count: u64,
    last_sample: Option<PerfSample>,
    origin: Instant,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_TARGET_FPS, DEFAULT_SAMPLE_WINDOW_MS, DEFAULT_HISTORY_LEN)
    }

    /// Telemetry with a custom nominal frame rate, FPS window and history
    /// length. Non-positive values fall back to the defaults.
    pub fn with_settings(target_fps: f64, window_ms: f64, history_len: usize) -> Self {
        let target_fps = if target_fps > 0.0 {
            target_fps
        } else {
            DEFAULT_TARGET_FPS
        };
        let window_ms = if window_ms > 0.0 {
            window_ms
        } else {
            DEFAULT_SAMPLE_WINDOW_MS
        };
        let history_len = if history_len >= 2 {
            history_len
        } else {
            DEFAULT_HISTORY_LEN
        };
        Self {
            history: VecDeque::with_capacity(history_len),
            history_len,
            window_ms,
            frame_interval_ms: 1000.0 / target_fps,
            dropped_frames: 0,
            frame_count: 0,
            last_sample: None,
            origin: Instant::now(),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::with_settings(
            config.target_fps,
            config.sample_window_ms,
            config.history_len,
        )
    }

    /// Record a frame presented at `timestamp_ms`.
    pub fn record_frame(&mut self, timestamp_ms: f64) {
        if let Some(&previous) = self.history.back() {
            let delta = timestamp_ms - previous;
            if delta < 0.0 {
                debug!(previous, timestamp_ms, "Frame clock went backwards, restarting history");
                self.history.clear();
            } else if delta > DROPPED_FRAME_FACTOR * self.frame_interval_ms {
                // Whole intervals that passed without a frame.
                let missed = (delta / self.frame_interval_ms).floor() as u64;
                self.dropped_frames += missed.saturating_sub(1).max(1);
            }
        }

        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(timestamp_ms);
        self.frame_count += 1;
    }

    /// Record a frame using the time elapsed since this telemetry was created.
    pub fn record_frame_now(&mut self) {
        let now = self.origin.elapsed().as_secs_f64() * 1000.0;
        self.record_frame(now);
    }

    /// Frames per second over the trailing window ending at the last frame.
    pub fn fps(&self) -> f64 {
        let Some(&last) = self.history.back() else {
            return 0.0;
        };
        let window_start = last - self.window_ms;
        let mut count = 0usize;
        let mut first = last;
        for &t in self.history.iter().rev() {
            if t < window_start {
                break;
            }
            first = t;
            count += 1;
        }
        let elapsed = last - first;
        if count < 2 || elapsed <= 0.0 {
            return 0.0;
        }
        (count - 1) as f64 * 1000.0 / elapsed
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn reset_dropped_frames(&mut self) {
        self.dropped_frames = 0;
    }

    /// Mean delta between recorded frames, in milliseconds. 0 with fewer
    /// than two frames.
    pub fn average_frame_time(&self) -> f64 {
        match (self.history.front(), self.history.back()) {
            (Some(&first), Some(&last)) if self.history.len() >= 2 => {
                (last - first) / (self.history.len() - 1) as f64
            }
            _ => 0.0,
        }
    }

    /// Frames recorded since creation or the last [`reset`](Self::reset).
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Nominal frame interval in milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    /// Snapshot the current statistics merged with `extra`, and keep it as
    /// the last sample.
    pub fn sample(&mut self, extra: SampleExtra) -> PerfSample {
        let sample = PerfSample {
            fps: self.fps(),
            dropped_frames: self.dropped_frames,
            avg_frame_time: self.average_frame_time(),
            timestamp: unix_millis(),
            extra,
        };
        self.last_sample = Some(sample.clone());
        sample
    }

    pub fn last_sample(&self) -> Option<&PerfSample> {
        self.last_sample.as_ref()
    }

    /// Clear history, counters and the last sample.
    pub fn reset(&mut self) {
        self.history.clear();
        self.dropped_frames = 0;
        self.frame_count = 0;
        self.last_sample = None;
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    #[test]
    fn test_initial_state() {
        let telemetry = Telemetry::new();
        assert_eq!(telemetry.fps(), 0.0);
        assert_eq!(telemetry.dropped_frames(), 0);
        assert_eq!(telemetry.average_frame_time(), 0.0);
        assert!(telemetry.last_sample().is_none());
    }

    #[test]
    fn test_fps_converges_at_60hz() {
        let mut telemetry = Telemetry::new();
        for i in 0..200 {
            telemetry.record_frame(i as f64 * FRAME_MS);
        }
        let fps = telemetry.fps();
        assert!((fps - 60.0).abs() < 0.5, "fps = {fps}");
        assert_eq!(telemetry.dropped_frames(), 0);
    }

    #[test]
    fn test_fps_only_counts_trailing_window() {
        let mut telemetry = Telemetry::new();
        // Slow start at 10 fps, then 60 fps for well over one window.
        for i in 0..10 {
            telemetry.record_frame(i as f64 * 100.0);
        }
        let start = 1000.0;
        for i in 0..60 {
            telemetry.record_frame(start + i as f64 * FRAME_MS);
        }
        assert!((telemetry.fps() - 60.0).abs() < 0.5);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut telemetry = Telemetry::with_settings(60.0, 500.0, 4);
        for i in 0..10 {
            telemetry.record_frame(i as f64 * 10.0);
        }
        // Only the last four frames (60..90) remain.
        assert_eq!(telemetry.average_frame_time(), 10.0);
        assert_eq!(telemetry.frame_count(), 10);
    }

    #[test]
    fn test_single_long_delta_is_dropped() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(0.0);
        telemetry.record_frame(50.0);
        assert!(telemetry.dropped_frames() >= 1);

        telemetry.reset_dropped_frames();
        assert_eq!(telemetry.dropped_frames(), 0);
    }

    #[test]
    fn test_dropped_frames_count_missed_intervals() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(0.0);
        telemetry.record_frame(16.0);
        assert_eq!(telemetry.dropped_frames(), 0);
        // 34 ms: two intervals, one missed.
        telemetry.record_frame(50.0);
        assert_eq!(telemetry.dropped_frames(), 1);
        telemetry.record_frame(66.0);
        // 54 ms: three intervals, two missed.
        telemetry.record_frame(120.0);
        assert_eq!(telemetry.dropped_frames(), 3);
    }

    #[test]
    fn test_just_under_threshold_is_not_dropped() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(0.0);
        telemetry.record_frame(24.0);
        assert_eq!(telemetry.dropped_frames(), 0);
    }

    #[test]
    fn test_average_frame_time() {
        let mut telemetry = Telemetry::new();
        for t in [0.0, 16.0, 32.0, 48.0] {
            telemetry.record_frame(t);
        }
        assert!((telemetry.average_frame_time() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_going_backwards_restarts_history() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(100.0);
        telemetry.record_frame(116.0);
        telemetry.record_frame(0.0);
        assert_eq!(telemetry.average_frame_time(), 0.0);
        telemetry.record_frame(16.0);
        assert_eq!(telemetry.average_frame_time(), 16.0);
        assert_eq!(telemetry.dropped_frames(), 0);
    }

    #[test]
    fn test_sample_merges_extra_and_is_kept() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(0.0);
        telemetry.record_frame(16.0);

        let mut extra = SampleExtra::new();
        extra.insert("gpuMB".into(), json!(128));
        extra.insert("test".into(), json!("value"));
        let sample = telemetry.sample(extra);

        assert_eq!(sample.get("gpuMB"), Some(&json!(128)));
        assert_eq!(sample.avg_frame_time, 16.0);
        assert!(sample.timestamp > 0);
        assert_eq!(telemetry.last_sample(), Some(&sample));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut telemetry = Telemetry::new();
        telemetry.record_frame(0.0);
        telemetry.record_frame(16.0);
        telemetry.record_frame(50.0);
        telemetry.sample(SampleExtra::new());
        assert!(telemetry.dropped_frames() > 0);

        telemetry.reset();
        assert_eq!(telemetry.fps(), 0.0);
        assert_eq!(telemetry.dropped_frames(), 0);
        assert_eq!(telemetry.average_frame_time(), 0.0);
        assert_eq!(telemetry.frame_count(), 0);
        assert!(telemetry.last_sample().is_none());
    }

    #[test]
    fn test_from_config() {
        let config = TelemetryConfig {
            target_fps: 30.0,
            sample_window_ms: 1000.0,
            history_len: 10,
            sample_interval_ms: 1000.0,
        };
        let telemetry = Telemetry::from_config(&config);
        assert!((telemetry.frame_interval_ms() - 1000.0 / 30.0).abs() < 1e-12);
    }
}
