//! Tile geometries: how each projection family cuts an image into levels
//! and tiles, where each tile sits in space, and which tiles touch.
//!
//! - [`CubeGeometry`]: six faces, neighbors continue across face edges.
//! - [`EquirectGeometry`]: one yaw/pitch grid wrapping at the yaw seam.
//! - [`FlatGeometry`]: a planar image with hard edges.

mod cube;
mod equirect;
mod error;
mod flat;
mod geometry;

pub use cube::{CubeGeometry, CubeLevel};
pub use equirect::{EquirectGeometry, EquirectLevel};
pub use error::GeometryError;
pub use flat::{FlatGeometry, FlatLevel};
pub use geometry::Geometry;
