//! Perspective view for spherical panoramas (cube and equirectangular).

use std::cell::Cell;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::{DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};
use tracing::trace;
use vista_config::ViewConfig;
use vista_core::math::{
    clamp, direction_from_yaw_pitch, htov, wrap_angle, yaw_pitch_from_direction,
};
use vista_core::{Emitter, Level, ScreenPoint, Size, ViewFrustum};

use crate::frustum::Frustum;
use crate::limiter::{LimitContext, Limiter, LimiterChain};
use crate::view::{View, ViewEvent};

/// Smallest representable vertical field of view.
pub const MIN_FOV: f64 = 1e-6;
/// Largest representable vertical field of view.
pub const MAX_FOV: f64 = PI - 1e-6;

const DEFAULT_FOV: f64 = FRAC_PI_4;
const NEAR: f64 = 0.01;
const FAR: f64 = 100.0;

/// Orientation and zoom of a [`RectilinearView`], all in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectilinearParams {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Vertical field of view.
    pub fov: f64,
}

impl Default for RectilinearParams {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov: DEFAULT_FOV,
        }
    }
}

/// A direction on the sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RectilinearCoords {
    pub yaw: f64,
    pub pitch: f64,
}

/// Built-in rectilinear constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RectilinearLimit {
    Yaw { min: f64, max: f64 },
    Pitch { min: f64, max: f64 },
    Roll { min: f64, max: f64 },
    /// Horizontal field of view bounds, converted for the current aspect.
    HFov { min: f64, max: f64 },
    /// Vertical field of view bounds.
    VFov { min: f64, max: f64 },
    /// Never zoom past one source pixel per device pixel for a face of
    /// `max` pixels.
    Resolution { max: f64 },
}

impl RectilinearLimit {
    /// The conventional chain: resolution cap, fov bounds and a pitch that
    /// stops at the poles. `max_hfov` defaults to `max_vfov`.
    #[must_use]
    pub fn traditional(
        max_resolution: f64,
        max_vfov: f64,
        max_hfov: Option<f64>,
    ) -> LimiterChain<RectilinearParams> {
        LimiterChain::new()
            .with(RectilinearLimit::Resolution {
                max: max_resolution,
            })
            .with(RectilinearLimit::VFov {
                min: 0.0,
                max: max_vfov,
            })
            .with(RectilinearLimit::HFov {
                min: 0.0,
                max: max_hfov.unwrap_or(max_vfov),
            })
            .with(RectilinearLimit::Pitch {
                min: -FRAC_PI_2,
                max: FRAC_PI_2,
            })
    }
}

impl Limiter<RectilinearParams> for RectilinearLimit {
    fn apply(&self, mut params: RectilinearParams, ctx: &LimitContext) -> RectilinearParams {
        match *self {
            RectilinearLimit::Yaw { min, max } => params.yaw = clamp(params.yaw, min, max),
            RectilinearLimit::Pitch { min, max } => params.pitch = clamp(params.pitch, min, max),
            RectilinearLimit::Roll { min, max } => params.roll = clamp(params.roll, min, max),
            RectilinearLimit::VFov { min, max } => params.fov = clamp(params.fov, min, max),
            RectilinearLimit::HFov { min, max } => {
                if !ctx.size.is_empty() {
                    let (w, h) = (ctx.size.width, ctx.size.height);
                    params.fov = clamp(params.fov, htov(min, w, h), htov(max, w, h));
                }
            }
            RectilinearLimit::Resolution { max } => {
                if !ctx.size.is_empty() && max > 0.0 {
                    let min_fov = 2.0 * (ctx.pixel_ratio * ctx.size.height / max).atan();
                    params.fov = params.fov.max(min_fov);
                }
            }
        }
        params
    }
}

/// Perspective view from the centre of a sphere.
///
/// Yaw 0 looks down −Z; positive yaw turns right, positive pitch looks down
/// and positive roll tilts the horizon clockwise. Yaw, pitch and roll are
/// kept in `(-π, π]` and the field of view in `[MIN_FOV, MAX_FOV]` before
/// the limiter chain runs.
pub struct RectilinearView {
    params: RectilinearParams,
    size: Size,
    pixel_ratio: f64,
    limiter: LimiterChain<RectilinearParams>,
    projection: Cell<Option<DMat4>>,
    frustum: Cell<Option<Frustum>>,
    events: Emitter<ViewEvent>,
}

impl RectilinearView {
    #[must_use]
    pub fn new(params: RectilinearParams) -> Self {
        Self::with_limiter(params, LimiterChain::new())
    }

    /// A view whose initial parameters are already limited.
    #[must_use]
    pub fn with_limiter(params: RectilinearParams, limiter: LimiterChain<RectilinearParams>) -> Self {
        let mut view = Self {
            params,
            size: Size::default(),
            pixel_ratio: 1.0,
            limiter,
            projection: Cell::new(None),
            frustum: Cell::new(None),
            events: Emitter::new(),
        };
        view.params = view.normalize(params);
        view
    }

    /// Default orientation, configured pixel ratio and fov, and a resolution
    /// limiter when a maximum resolution is configured.
    #[must_use]
    pub fn from_config(config: &ViewConfig) -> Self {
        let mut limiter = LimiterChain::new();
        if config.max_resolution > 0 {
            limiter.push(RectilinearLimit::Resolution {
                max: f64::from(config.max_resolution),
            });
        }
        let mut view = Self::with_limiter(
            RectilinearParams {
                fov: config.default_fov,
                ..RectilinearParams::default()
            },
            limiter,
        );
        view.set_pixel_ratio(config.pixel_ratio);
        view
    }

    #[must_use]
    pub fn yaw(&self) -> f64 {
        self.params.yaw
    }

    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.params.pitch
    }

    #[must_use]
    pub fn roll(&self) -> f64 {
        self.params.roll
    }

    #[must_use]
    pub fn fov(&self) -> f64 {
        self.params.fov
    }

    pub fn set_yaw(&mut self, yaw: f64) {
        self.update(RectilinearParams { yaw, ..self.params });
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        self.update(RectilinearParams { pitch, ..self.params });
    }

    pub fn set_roll(&mut self, roll: f64) {
        self.update(RectilinearParams { roll, ..self.params });
    }

    pub fn set_fov(&mut self, fov: f64) {
        self.update(RectilinearParams { fov, ..self.params });
    }

    pub fn offset_yaw(&mut self, delta: f64) {
        self.set_yaw(self.params.yaw + delta);
    }

    pub fn offset_pitch(&mut self, delta: f64) {
        self.set_pitch(self.params.pitch + delta);
    }

    pub fn offset_fov(&mut self, delta: f64) {
        self.set_fov(self.params.fov + delta);
    }

    /// The limiter chain currently in force.
    #[must_use]
    pub fn limiter(&self) -> &LimiterChain<RectilinearParams> {
        &self.limiter
    }

    /// Inverse of [`View::projection`].
    #[must_use]
    pub fn inverse_projection(&self) -> DMat4 {
        self.projection().inverse()
    }

    /// World-to-eye rotation: yaw about Y, then pitch about X, then roll.
    fn view_matrix(&self) -> DMat4 {
        DMat4::from_rotation_z(self.params.roll)
            * DMat4::from_rotation_x(self.params.pitch)
            * DMat4::from_rotation_y(self.params.yaw)
    }

    fn context(&self) -> LimitContext {
        LimitContext {
            size: self.size,
            pixel_ratio: self.pixel_ratio,
        }
    }

    fn normalize(&self, params: RectilinearParams) -> RectilinearParams {
        let fov = if params.fov.is_finite() { params.fov } else { DEFAULT_FOV };
        let wrapped = RectilinearParams {
            yaw: wrap_angle(params.yaw),
            pitch: wrap_angle(params.pitch),
            roll: wrap_angle(params.roll),
            fov: clamp(fov, MIN_FOV, MAX_FOV),
        };
        let limited = self.limiter.apply(wrapped, &self.context());
        RectilinearParams {
            fov: clamp(limited.fov, MIN_FOV, MAX_FOV),
            ..limited
        }
    }

    fn update(&mut self, params: RectilinearParams) {
        let next = self.normalize(params);
        if next != params {
            trace!(requested = ?params, applied = ?next, "view parameters limited");
        }
        if next != self.params {
            self.params = next;
            self.invalidate();
            self.events.emit(&ViewEvent::Change);
        }
    }

    fn invalidate(&self) {
        self.projection.set(None);
        self.frustum.set(None);
    }

    fn frustum(&self) -> Frustum {
        if let Some(frustum) = self.frustum.get() {
            return frustum;
        }
        let frustum = Frustum::from_view_projection(&self.projection());
        self.frustum.set(Some(frustum));
        frustum
    }
}

impl Default for RectilinearView {
    fn default() -> Self {
        Self::new(RectilinearParams::default())
    }
}

impl std::fmt::Debug for RectilinearView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RectilinearView")
            .field("params", &self.params)
            .field("size", &self.size)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl ViewFrustum for RectilinearView {
    fn intersects(&self, vertices: &[DVec3]) -> bool {
        self.frustum().intersects(vertices)
    }

    fn center(&self) -> DVec3 {
        direction_from_yaw_pitch(self.params.yaw, self.params.pitch)
    }

    fn select_level(&self, levels: &[Level]) -> Option<usize> {
        let required = self.pixel_ratio * self.size.height;
        let cover = (self.params.fov * 0.5).tan();
        let mut last = None;
        for (index, level) in levels.iter().enumerate() {
            if !level.is_selectable() {
                continue;
            }
            if cover * f64::from(level.face_size()) >= required {
                return Some(index);
            }
            last = Some(index);
        }
        last
    }
}

impl View for RectilinearView {
    type Params = RectilinearParams;
    type Coords = RectilinearCoords;

    fn parameters(&self) -> RectilinearParams {
        self.params
    }

    fn set_parameters(&mut self, params: RectilinearParams) {
        self.update(params);
    }

    fn size(&self) -> Size {
        self.size
    }

    fn set_size(&mut self, size: Size) {
        if size == self.size {
            return;
        }
        self.size = size;
        self.invalidate();
        self.events.emit(&ViewEvent::Resize);
        // Size-dependent limiters may now bound the parameters differently.
        self.update(self.params);
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        let ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        if ratio != self.pixel_ratio {
            self.pixel_ratio = ratio;
            self.update(self.params);
        }
    }

    fn set_limiter(&mut self, limiter: LimiterChain<RectilinearParams>) {
        self.limiter = limiter;
        self.update(self.params);
    }

    fn projection(&self) -> DMat4 {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let perspective = DMat4::perspective_rh(self.params.fov, self.size.aspect(), NEAR, FAR);
        let projection = perspective * self.view_matrix();
        self.projection.set(Some(projection));
        projection
    }

    fn coordinates_to_screen(&self, coords: RectilinearCoords) -> Option<ScreenPoint> {
        if self.size.is_empty() {
            return None;
        }
        let dir = direction_from_yaw_pitch(coords.yaw, coords.pitch);
        let clip = self.projection() * DVec4::new(dir.x, dir.y, dir.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        Some(ScreenPoint::new(
            (ndc_x + 1.0) * 0.5 * self.size.width,
            (1.0 - ndc_y) * 0.5 * self.size.height,
        ))
    }

    fn screen_to_coordinates(&self, point: ScreenPoint) -> Option<RectilinearCoords> {
        if self.size.is_empty() {
            return None;
        }
        let ndc_x = point.x / self.size.width * 2.0 - 1.0;
        let ndc_y = 1.0 - point.y / self.size.height * 2.0;
        let half = (self.params.fov * 0.5).tan();
        let eye_ray = DVec3::new(ndc_x * half * self.size.aspect(), ndc_y * half, -1.0);
        // The view matrix is a pure rotation, so its transpose is its inverse.
        let world = self.view_matrix().transpose().transform_vector3(eye_ray);
        let (yaw, pitch) = yaw_pitch_from_direction(world);
        Some(RectilinearCoords { yaw, pitch })
    }

    fn events(&mut self) -> &mut Emitter<ViewEvent> {
        &mut self.events
    }
}
