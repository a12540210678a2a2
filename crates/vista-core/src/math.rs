//! Angle and field-of-view helpers shared by views and geometries.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Wrap an angle into `(-π, π]`. Non-finite input maps to `0.0`.
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { PI } else { wrapped }
}

/// Clamp that tolerates inverted bounds by honoring `min` first.
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Convert a horizontal field of view to the vertical one for a viewport.
#[must_use]
pub fn htov(hfov: f64, width: f64, height: f64) -> f64 {
    2.0 * ((hfov / 2.0).tan() * height / width).atan()
}

/// Convert a vertical field of view to the horizontal one for a viewport.
#[must_use]
pub fn vtoh(vfov: f64, width: f64, height: f64) -> f64 {
    2.0 * ((vfov / 2.0).tan() * width / height).atan()
}

/// Unit direction for a yaw/pitch pair. Yaw 0 looks down −Z, positive yaw
/// turns toward +X and positive pitch looks down.
#[must_use]
pub fn direction_from_yaw_pitch(yaw: f64, pitch: f64) -> glam::DVec3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    glam::DVec3::new(sy * cp, -sp, -cy * cp)
}

/// Inverse of [`direction_from_yaw_pitch`]; the direction need not be unit length.
#[must_use]
pub fn yaw_pitch_from_direction(dir: glam::DVec3) -> (f64, f64) {
    let yaw = dir.x.atan2(-dir.z);
    let pitch = (-dir.y).atan2(dir.x.hypot(dir.z));
    (yaw, pitch)
}

/// Viewport size in logical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width over height, or 1 when the viewport is degenerate.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.is_empty() { 1.0 } else { self.width / self.height }
    }

    /// True when either dimension is zero, negative or not finite.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite())
    }
}

/// A position on screen in logical pixels, origin top-left, y down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
