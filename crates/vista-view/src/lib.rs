//! Views: the camera side of tile streaming.
//!
//! A view holds orientation (or pan/zoom) parameters and a viewport size,
//! keeps them inside the bounds its limiter chain imposes, and answers the
//! three questions the rest of the pipeline asks: which level of detail to
//! show, whether a tile's bounding volume is on screen, and how world
//! coordinates map to pixels.

mod flat;
mod frustum;
mod limiter;
mod rectilinear;
mod view;

pub use flat::{FlatCoords, FlatLimit, FlatParams, FlatView};
pub use frustum::Frustum;
pub use limiter::{LimitContext, Limiter, LimiterChain};
pub use rectilinear::{
    MAX_FOV, MIN_FOV, RectilinearCoords, RectilinearLimit, RectilinearParams, RectilinearView,
};
pub use view::{View, ViewEvent};
pub use vista_core::ViewFrustum;
