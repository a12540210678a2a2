//! Cube-map geometry: six square faces per level.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use vista_core::{CubeFace, Level, Tile, TileDirection, direction_to_face_coord};

use crate::error::GeometryError;
use crate::geometry::{Geometry, validate_levels};

/// How far past a face edge to step when looking for the adjacent face.
const EDGE_STEP: f64 = 1e-6;

/// One cube level: square faces of `size` pixels cut into `tile_size` tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeLevel {
    pub size: u32,
    pub tile_size: u32,
    #[serde(default)]
    pub fallback_only: bool,
}

impl CubeLevel {
    #[must_use]
    pub const fn new(size: u32, tile_size: u32) -> Self {
        Self {
            size,
            tile_size,
            fallback_only: false,
        }
    }

    fn to_level(self) -> Level {
        let level = Level::new(self.size, self.size, self.tile_size, self.tile_size)
            .with_face_size(self.size);
        if self.fallback_only {
            level.fallback_only()
        } else {
            level
        }
    }
}

/// Cube-map geometry. Face coordinates run from −1 to 1 along each face's
/// `right` and `down` vectors; tile `(0, 0)` is a face's top-left corner.
#[derive(Clone, Debug)]
pub struct CubeGeometry {
    levels: Vec<Level>,
}

impl CubeGeometry {
    pub fn new(levels: &[CubeLevel]) -> Result<Self, GeometryError> {
        let levels: Vec<Level> = levels.iter().map(|l| l.to_level()).collect();
        validate_levels(&levels)?;
        tracing::debug!(levels = levels.len(), "cube geometry");
        Ok(Self { levels })
    }

    fn face_of(tile: Tile) -> CubeFace {
        tile.face.unwrap_or(CubeFace::Front)
    }

    /// Face coordinates `(s, t)` of a normalized grid position.
    fn face_coords(u: f64, v: f64) -> (f64, f64) {
        (u * 2.0 - 1.0, v * 2.0 - 1.0)
    }
}

impl Geometry for CubeGeometry {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn tile_vertices(&self, tile: Tile, out: &mut Vec<DVec3>) {
        let Some(level) = self.level(tile.z) else {
            return;
        };
        let face = Self::face_of(tile);
        let e = level.extent(tile.x, tile.y);
        let (s0, t0) = Self::face_coords(e.u0, e.v0);
        let (s1, t1) = Self::face_coords(e.u1, e.v1);
        out.extend([
            face.point(s0, t0),
            face.point(s1, t0),
            face.point(s1, t1),
            face.point(s0, t1),
        ]);
    }

    fn tile_center(&self, tile: Tile) -> DVec3 {
        let Some(level) = self.level(tile.z) else {
            return Self::face_of(tile).normal();
        };
        let (u, v) = level.extent(tile.x, tile.y).center();
        let (s, t) = Self::face_coords(u, v);
        Self::face_of(tile).point(s, t).normalize()
    }

    fn tile_at(&self, point: DVec3, z: u32) -> Option<Tile> {
        let level = self.level(z)?;
        let (face, s, t) = direction_to_face_coord(point);
        let (x, y) = level.tile_at((s + 1.0) * 0.5, (t + 1.0) * 0.5);
        Some(Tile::on_face(face, x, y, z))
    }

    fn neighbor(&self, tile: Tile, direction: TileDirection) -> Option<Tile> {
        let level = self.level(tile.z)?;
        let (dx, dy) = direction.offset();
        let nx = i64::from(tile.x) + dx;
        let ny = i64::from(tile.y) + dy;
        if (0..i64::from(level.cols())).contains(&nx) && (0..i64::from(level.rows())).contains(&ny)
        {
            return Some(Tile {
                x: nx as u32,
                y: ny as u32,
                ..tile
            });
        }

        // Off the face: step just past the shared edge from the middle of
        // this tile's side and see which face the point projects onto.
        let (u, v) = level.extent(tile.x, tile.y).center();
        let (mut s, mut t) = Self::face_coords(u, v);
        match direction {
            TileDirection::Left => s = -1.0 - EDGE_STEP,
            TileDirection::Right => s = 1.0 + EDGE_STEP,
            TileDirection::Up => t = -1.0 - EDGE_STEP,
            TileDirection::Down => t = 1.0 + EDGE_STEP,
        }
        self.tile_at(Self::face_of(tile).point(s, t), tile.z)
    }

    fn tiles(&self, z: u32, out: &mut Vec<Tile>) {
        let Some(level) = self.level(z) else {
            return;
        };
        for face in CubeFace::ALL {
            for y in 0..level.rows() {
                for x in 0..level.cols() {
                    out.push(Tile::on_face(face, x, y, z));
                }
            }
        }
    }

    fn contains(&self, tile: Tile) -> bool {
        tile.face.is_some()
            && self
                .level(tile.z)
                .is_some_and(|level| tile.x < level.cols() && tile.y < level.rows())
    }
}
