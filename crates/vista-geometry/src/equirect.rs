//! Equirectangular geometry: one image spanning 360° of yaw and 180° of pitch.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_8, PI, TAU};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use vista_core::math::{direction_from_yaw_pitch, yaw_pitch_from_direction};
use vista_core::{Level, Tile, TileDirection};

use crate::error::GeometryError;
use crate::geometry::{Geometry, validate_levels};

/// Maximum angular spacing between bounding volume samples.
const SAMPLE_STEP: f64 = FRAC_PI_8;

/// One equirectangular level. Tile dimensions default to the whole image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquirectLevel {
    pub width: u32,
    #[serde(default)]
    pub tile_width: Option<u32>,
    #[serde(default)]
    pub tile_height: Option<u32>,
    #[serde(default)]
    pub fallback_only: bool,
}

impl EquirectLevel {
    /// A level stored as a single tile.
    #[must_use]
    pub const fn new(width: u32) -> Self {
        Self {
            width,
            tile_width: None,
            tile_height: None,
            fallback_only: false,
        }
    }

    /// A level cut into `tile_width × tile_height` tiles.
    #[must_use]
    pub const fn tiled(width: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            tile_width: Some(tile_width),
            tile_height: Some(tile_height),
            fallback_only: false,
        }
    }

    fn to_level(self) -> Level {
        let height = self.width / 2;
        // A quarter of the width spans the same 90° as a cube face.
        let level = Level::new(
            self.width,
            height,
            self.tile_width.unwrap_or(self.width),
            self.tile_height.unwrap_or(height),
        )
        .with_face_size(self.width / 4);
        if self.fallback_only {
            level.fallback_only()
        } else {
            level
        }
    }
}

/// Equirectangular geometry. Column 0 starts at yaw −π, row 0 at the zenith.
/// Left and right neighbors wrap around the yaw seam; there is nothing above
/// the top row or below the bottom row.
#[derive(Clone, Debug)]
pub struct EquirectGeometry {
    levels: Vec<Level>,
}

impl EquirectGeometry {
    pub fn new(levels: &[EquirectLevel]) -> Result<Self, GeometryError> {
        let levels: Vec<Level> = levels.iter().map(|l| l.to_level()).collect();
        validate_levels(&levels)?;
        tracing::debug!(levels = levels.len(), "equirect geometry");
        Ok(Self { levels })
    }

    fn yaw(u: f64) -> f64 {
        -PI + TAU * u
    }

    fn pitch(v: f64) -> f64 {
        -FRAC_PI_2 + PI * v
    }
}

impl Geometry for EquirectGeometry {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn tile_vertices(&self, tile: Tile, out: &mut Vec<DVec3>) {
        let Some(level) = self.level(tile.z) else {
            return;
        };
        let e = level.extent(tile.x, tile.y);
        let (yaw0, yaw1) = (Self::yaw(e.u0), Self::yaw(e.u1));
        let (pitch0, pitch1) = (Self::pitch(e.v0), Self::pitch(e.v1));
        let yaw_steps = ((yaw1 - yaw0) / SAMPLE_STEP).ceil().max(1.0) as usize;
        let pitch_steps = ((pitch1 - pitch0) / SAMPLE_STEP).ceil().max(1.0) as usize;

        // Walk the boundary clockwise: top, right, bottom, left.
        for i in 0..yaw_steps {
            let yaw = yaw0 + (yaw1 - yaw0) * i as f64 / yaw_steps as f64;
            out.push(direction_from_yaw_pitch(yaw, pitch0));
        }
        for i in 0..pitch_steps {
            let pitch = pitch0 + (pitch1 - pitch0) * i as f64 / pitch_steps as f64;
            out.push(direction_from_yaw_pitch(yaw1, pitch));
        }
        for i in 0..yaw_steps {
            let yaw = yaw1 - (yaw1 - yaw0) * i as f64 / yaw_steps as f64;
            out.push(direction_from_yaw_pitch(yaw, pitch1));
        }
        for i in 0..pitch_steps {
            let pitch = pitch1 - (pitch1 - pitch0) * i as f64 / pitch_steps as f64;
            out.push(direction_from_yaw_pitch(yaw0, pitch));
        }
        out.push(self.tile_center(tile));
    }

    fn tile_center(&self, tile: Tile) -> DVec3 {
        let Some(level) = self.level(tile.z) else {
            return DVec3::NEG_Z;
        };
        let (u, v) = level.extent(tile.x, tile.y).center();
        direction_from_yaw_pitch(Self::yaw(u), Self::pitch(v))
    }

    fn tile_at(&self, point: DVec3, z: u32) -> Option<Tile> {
        let level = self.level(z)?;
        let (yaw, pitch) = yaw_pitch_from_direction(point);
        let (x, y) = level.tile_at((yaw + PI) / TAU, (pitch + FRAC_PI_2) / PI);
        Some(Tile::new(x, y, z))
    }

    fn neighbor(&self, tile: Tile, direction: TileDirection) -> Option<Tile> {
        let level = self.level(tile.z)?;
        let cols = i64::from(level.cols());
        let rows = i64::from(level.rows());
        let (dx, dy) = direction.offset();
        let ny = i64::from(tile.y) + dy;
        if !(0..rows).contains(&ny) {
            return None;
        }
        let nx = (i64::from(tile.x) + dx).rem_euclid(cols);
        let next = Tile::new(nx as u32, ny as u32, tile.z);
        (next != tile).then_some(next)
    }

    fn tiles(&self, z: u32, out: &mut Vec<Tile>) {
        let Some(level) = self.level(z) else {
            return;
        };
        for y in 0..level.rows() {
            for x in 0..level.cols() {
                out.push(Tile::new(x, y, z));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::Size;
    use vista_view::{RectilinearParams, RectilinearView, View};

    fn geometry() -> EquirectGeometry {
        EquirectGeometry::new(&[EquirectLevel::new(1024), EquirectLevel::tiled(4096, 512, 512)])
            .unwrap()
    }

    #[test]
    fn test_levels() {
        let g = geometry();
        assert_eq!(g.levels()[0].tile_count(), 1);
        assert_eq!(g.levels()[1].cols(), 8);
        assert_eq!(g.levels()[1].rows(), 4);
        assert_eq!(g.levels()[1].face_size(), 1024);
    }

    #[test]
    fn test_neighbors_wrap_at_seam() {
        let g = geometry();
        assert_eq!(g.neighbor(Tile::new(0, 1, 1), TileDirection::Left), Some(Tile::new(7, 1, 1)));
        assert_eq!(g.neighbor(Tile::new(7, 1, 1), TileDirection::Right), Some(Tile::new(0, 1, 1)));
        assert_eq!(g.neighbor(Tile::new(3, 0, 1), TileDirection::Up), None);
        assert_eq!(g.neighbor(Tile::new(3, 3, 1), TileDirection::Down), None);
        // A single tile has no neighbors.
        assert!(g.neighbors(Tile::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn test_neighbor_roundtrip() {
        let g = geometry();
        let tile = Tile::new(4, 1, 1);
        for direction in TileDirection::ALL {
            let next = g.neighbor(tile, direction).unwrap();
            assert_eq!(g.neighbor(next, direction.opposite()), Some(tile));
        }
    }

    #[test]
    fn test_tile_at() {
        let g = geometry();
        // Looking ahead (yaw 0) is the middle of the image.
        assert_eq!(g.tile_at(DVec3::NEG_Z, 1), Some(Tile::new(4, 2, 1)));
        // Straight up is the top row.
        assert_eq!(g.tile_at(DVec3::Y, 1).map(|t| t.y), Some(0));
        assert_eq!(g.tile_at(DVec3::NEG_Z, 0), Some(Tile::new(0, 0, 0)));
    }

    #[test]
    fn test_parent() {
        let g = geometry();
        assert_eq!(g.parent(Tile::new(5, 3, 1)), Some(Tile::new(0, 0, 0)));
        assert_eq!(g.children(Tile::new(0, 0, 0)).len(), 32);
    }

    #[test]
    fn test_visible_tiles() {
        let g = geometry();
        let mut view = RectilinearView::new(RectilinearParams {
            fov: 0.5,
            ..RectilinearParams::default()
        });
        view.set_size(Size::new(100.0, 100.0));

        let mut result = Vec::new();
        let count = g.visible_tiles(&view, 1, &mut result);
        assert_eq!(count, result.len());
        assert!(result.contains(&Tile::new(4, 2, 1)));
        assert!(result.contains(&Tile::new(3, 1, 1)));
        // Tiles behind the viewer are excluded.
        assert!(!result.contains(&Tile::new(0, 1, 1)));
        assert!(!result.contains(&Tile::new(7, 2, 1)));
    }

    #[test]
    fn test_bounding_samples_are_dense() {
        let g = geometry();
        let mut vertices = Vec::new();
        g.tile_vertices(Tile::new(0, 0, 0), &mut vertices);
        // 16 samples around the yaw loop twice, 8 along each meridian, plus the centre.
        assert_eq!(vertices.len(), 16 * 2 + 8 * 2 + 1);
        for v in &vertices {
            assert!((v.length() - 1.0).abs() < 1e-12);
        }
    }
}
