//! Orthographic view over a flat image.
//!
//! The image occupies the plane `z = -1` with `x` in `[-0.5, 0.5]` and `y`
//! scaled by the inverse of the media aspect ratio, so a square pixel stays
//! square. View coordinates are normalized image coordinates, `(0, 0)` at the
//! top-left corner and `(1, 1)` at the bottom-right.

use std::cell::Cell;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};
use tracing::trace;
use vista_core::math::clamp;
use vista_core::{Emitter, Level, ScreenPoint, Size, ViewFrustum};

use crate::frustum::Frustum;
use crate::limiter::{LimitContext, Limiter, LimiterChain};
use crate::view::{View, ViewEvent};

const MIN_ZOOM: f64 = 1e-6;

/// Pan and zoom of a [`FlatView`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatParams {
    /// Normalized horizontal image coordinate at the viewport centre.
    pub x: f64,
    /// Normalized vertical image coordinate at the viewport centre.
    pub y: f64,
    /// Visible fraction of the image width.
    pub zoom: f64,
}

impl Default for FlatParams {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            zoom: 1.0,
        }
    }
}

/// A point on the image in normalized coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatCoords {
    pub x: f64,
    pub y: f64,
}

/// Built-in flat constraints. The `Visible*` and `Letterbox` variants need
/// the media aspect ratio, which the view passes in through its own chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlatLimit {
    X { min: f64, max: f64 },
    Y { min: f64, max: f64 },
    Zoom { min: f64, max: f64 },
    /// Never show fewer than one device pixel per source pixel for an image
    /// `max` pixels wide.
    Resolution { max: f64 },
    /// Keep the visible horizontal range inside `[min, max]`.
    VisibleX { min: f64, max: f64 },
    /// Keep the visible vertical range inside `[min, max]`.
    VisibleY { min: f64, max: f64, media_aspect_ratio: f64 },
    /// Never zoom out past the whole image, and centre an axis that fits.
    Letterbox { media_aspect_ratio: f64 },
}

impl FlatLimit {
    /// Keep the image fully on screen with letterboxing when it is smaller
    /// than the viewport.
    #[must_use]
    pub fn letterbox(media_aspect_ratio: f64) -> LimiterChain<FlatParams> {
        LimiterChain::new().with(FlatLimit::Letterbox { media_aspect_ratio })
    }
}

/// Fraction of the image height visible for a zoom level.
fn visible_height(zoom: f64, media_aspect_ratio: f64, size: Size) -> f64 {
    zoom * media_aspect_ratio / size.aspect()
}

fn fit_axis(center: f64, span: f64, min: f64, max: f64) -> f64 {
    if span >= max - min {
        (min + max) * 0.5
    } else {
        clamp(center, min + span * 0.5, max - span * 0.5)
    }
}

impl Limiter<FlatParams> for FlatLimit {
    fn apply(&self, mut params: FlatParams, ctx: &LimitContext) -> FlatParams {
        match *self {
            FlatLimit::X { min, max } => params.x = clamp(params.x, min, max),
            FlatLimit::Y { min, max } => params.y = clamp(params.y, min, max),
            FlatLimit::Zoom { min, max } => params.zoom = clamp(params.zoom, min, max),
            FlatLimit::Resolution { max } => {
                if !ctx.size.is_empty() && max > 0.0 {
                    params.zoom = params.zoom.max(ctx.pixel_ratio * ctx.size.width / max);
                }
            }
            FlatLimit::VisibleX { min, max } => {
                params.zoom = params.zoom.min(max - min);
                params.x = fit_axis(params.x, params.zoom, min, max);
            }
            FlatLimit::VisibleY {
                min,
                max,
                media_aspect_ratio,
            } => {
                let span = visible_height(params.zoom, media_aspect_ratio, ctx.size);
                if span > max - min && span > 0.0 {
                    params.zoom *= (max - min) / span;
                }
                let span = visible_height(params.zoom, media_aspect_ratio, ctx.size);
                params.y = fit_axis(params.y, span, min, max);
            }
            FlatLimit::Letterbox { media_aspect_ratio } => {
                let fit_zoom = 1.0f64.max(ctx.size.aspect() / media_aspect_ratio);
                params.zoom = params.zoom.min(fit_zoom);
                params.x = fit_axis(params.x, params.zoom, 0.0, 1.0);
                let span = visible_height(params.zoom, media_aspect_ratio, ctx.size);
                params.y = fit_axis(params.y, span, 0.0, 1.0);
            }
        }
        params
    }
}

/// Orthographic view of a flat image with a fixed media aspect ratio.
pub struct FlatView {
    params: FlatParams,
    media_aspect_ratio: f64,
    size: Size,
    pixel_ratio: f64,
    limiter: LimiterChain<FlatParams>,
    projection: Cell<Option<DMat4>>,
    frustum: Cell<Option<Frustum>>,
    events: Emitter<ViewEvent>,
}

impl FlatView {
    /// `media_aspect_ratio` is the image width over its height.
    #[must_use]
    pub fn new(params: FlatParams, media_aspect_ratio: f64) -> Self {
        Self::with_limiter(params, media_aspect_ratio, LimiterChain::new())
    }

    #[must_use]
    pub fn with_limiter(
        params: FlatParams,
        media_aspect_ratio: f64,
        limiter: LimiterChain<FlatParams>,
    ) -> Self {
        let media_aspect_ratio = if media_aspect_ratio.is_finite() && media_aspect_ratio > 0.0 {
            media_aspect_ratio
        } else {
            1.0
        };
        let mut view = Self {
            params,
            media_aspect_ratio,
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

    #[must_use]
    pub fn x(&self) -> f64 {
        self.params.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.params.y
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.params.zoom
    }

    #[must_use]
    pub fn media_aspect_ratio(&self) -> f64 {
        self.media_aspect_ratio
    }

    pub fn set_x(&mut self, x: f64) {
        self.update(FlatParams { x, ..self.params });
    }

    pub fn set_y(&mut self, y: f64) {
        self.update(FlatParams { y, ..self.params });
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.update(FlatParams { zoom, ..self.params });
    }

    pub fn offset_x(&mut self, delta: f64) {
        self.set_x(self.params.x + delta);
    }

    pub fn offset_y(&mut self, delta: f64) {
        self.set_y(self.params.y + delta);
    }

    pub fn offset_zoom(&mut self, delta: f64) {
        self.set_zoom(self.params.zoom + delta);
    }

    /// World-space point of a normalized image coordinate.
    #[must_use]
    pub fn image_point(&self, coords: FlatCoords) -> DVec3 {
        DVec3::new(coords.x - 0.5, (0.5 - coords.y) / self.media_aspect_ratio, -1.0)
    }

    fn half_extents(&self) -> (f64, f64) {
        let half_w = self.params.zoom * 0.5;
        (half_w, half_w / self.size.aspect())
    }

    fn normalize(&self, params: FlatParams) -> FlatParams {
        let finite = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        let defaults = FlatParams::default();
        let clean = FlatParams {
            x: finite(params.x, defaults.x),
            y: finite(params.y, defaults.y),
            zoom: finite(params.zoom, defaults.zoom).max(MIN_ZOOM),
        };
        let ctx = LimitContext {
            size: self.size,
            pixel_ratio: self.pixel_ratio,
        };
        let limited = self.limiter.apply(clean, &ctx);
        FlatParams {
            zoom: limited.zoom.max(MIN_ZOOM),
            ..limited
        }
    }

    fn update(&mut self, params: FlatParams) {
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

impl std::fmt::Debug for FlatView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatView")
            .field("params", &self.params)
            .field("media_aspect_ratio", &self.media_aspect_ratio)
            .field("size", &self.size)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl ViewFrustum for FlatView {
    fn intersects(&self, vertices: &[DVec3]) -> bool {
        self.frustum().intersects(vertices)
    }

    fn center(&self) -> DVec3 {
        self.image_point(FlatCoords {
            x: self.params.x,
            y: self.params.y,
        })
    }

    fn select_level(&self, levels: &[Level]) -> Option<usize> {
        let required = self.pixel_ratio * self.size.width / self.params.zoom;
        let mut last = None;
        for (index, level) in levels.iter().enumerate() {
            if !level.is_selectable() {
                continue;
            }
            if f64::from(level.width()) >= required {
                return Some(index);
            }
            last = Some(index);
        }
        last
    }
}

impl View for FlatView {
    type Params = FlatParams;
    type Coords = FlatCoords;

    fn parameters(&self) -> FlatParams {
        self.params
    }

    fn set_parameters(&mut self, params: FlatParams) {
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

    fn set_limiter(&mut self, limiter: LimiterChain<FlatParams>) {
        self.limiter = limiter;
        self.update(self.params);
    }

    fn projection(&self) -> DMat4 {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let (half_w, half_h) = self.half_extents();
        let center = self.center();
        let ortho = DMat4::orthographic_rh(-half_w, half_w, -half_h, half_h, 0.1, 10.0);
        let projection = ortho * DMat4::from_translation(DVec3::new(-center.x, -center.y, 0.0));
        self.projection.set(Some(projection));
        projection
    }

    fn coordinates_to_screen(&self, coords: FlatCoords) -> Option<ScreenPoint> {
        if self.size.is_empty() {
            return None;
        }
        let ndc = self.projection().project_point3(self.image_point(coords));
        Some(ScreenPoint::new(
            (ndc.x + 1.0) * 0.5 * self.size.width,
            (1.0 - ndc.y) * 0.5 * self.size.height,
        ))
    }

    fn screen_to_coordinates(&self, point: ScreenPoint) -> Option<FlatCoords> {
        if self.size.is_empty() {
            return None;
        }
        let (half_w, half_h) = self.half_extents();
        let ndc_x = point.x / self.size.width * 2.0 - 1.0;
        let ndc_y = 1.0 - point.y / self.size.height * 2.0;
        let center = self.center();
        let world_x = center.x + ndc_x * half_w;
        let world_y = center.y + ndc_y * half_h;
        Some(FlatCoords {
            x: world_x + 0.5,
            y: 0.5 - world_y * self.media_aspect_ratio,
        })
    }

    fn events(&mut self) -> &mut Emitter<ViewEvent> {
        &mut self.events
    }
}
