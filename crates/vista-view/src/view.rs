use glam::DMat4;
use vista_core::{Emitter, ScreenPoint, Size, ViewFrustum};

use crate::limiter::LimiterChain;

/// Notifications a view emits after its state changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// Parameters changed (after limiting).
    Change,
    /// Viewport size changed.
    Resize,
}

/// Common surface of every view.
///
/// Parameters are normalised and limited on every write, so reading them
/// back always yields values inside the limiter chain's bounds.
pub trait View: ViewFrustum {
    /// The full parameter set, e.g. yaw/pitch/roll/fov.
    type Params: Copy + PartialEq + std::fmt::Debug;
    /// A position in the view's coordinate space.
    type Coords: Copy;

    fn parameters(&self) -> Self::Params;
    fn set_parameters(&mut self, params: Self::Params);

    fn size(&self) -> Size;
    fn set_size(&mut self, size: Size);

    fn pixel_ratio(&self) -> f64;
    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Replace the limiter chain and re-clamp the current parameters.
    fn set_limiter(&mut self, limiter: LimiterChain<Self::Params>);

    /// Combined projection and view matrix, recomputed only after a change.
    fn projection(&self) -> DMat4;

    /// Screen position of `coords`, `None` if it is behind the camera or
    /// the viewport is empty.
    fn coordinates_to_screen(&self, coords: Self::Coords) -> Option<ScreenPoint>;

    /// View coordinates under a screen position, `None` if the viewport is empty.
    fn screen_to_coordinates(&self, point: ScreenPoint) -> Option<Self::Coords>;

    fn events(&mut self) -> &mut Emitter<ViewEvent>;
}
