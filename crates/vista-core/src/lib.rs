//! Shared vocabulary for the Vista tile streaming core.
//!
//! Tiles, cube faces, resolution levels, angle helpers, the visibility
//! contract views fulfil for geometries, and a small subscribe/unsubscribe
//! event emitter. Everything here is a plain value or a narrow trait; the
//! behavior lives in the view, geometry, lod, texture and render crates.

mod emitter;
mod face;
mod frustum;
mod level;
pub mod math;
mod tile;

pub use emitter::{Emitter, SubscriptionId};
pub use face::{CubeFace, direction_to_face, direction_to_face_coord};
pub use frustum::ViewFrustum;
pub use level::{Level, TileExtent};
pub use math::{ScreenPoint, Size};
pub use tile::{Tile, TileDirection, TileSet};
