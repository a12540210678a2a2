//! Tile identity and adjacency directions.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::face::CubeFace;

/// Address of one tile: an optional cube face, a column, a row and a level.
///
/// Tiles are values. Two tiles are the same tile exactly when all four
/// components match, so they can be used directly as map and set keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    /// Cube face; `None` for single-surface geometries.
    pub face: Option<CubeFace>,
    /// Column index within the level grid.
    pub x: u32,
    /// Row index within the level grid, growing downward.
    pub y: u32,
    /// Level index, 0 being the coarsest.
    pub z: u32,
}

impl Tile {
    /// A tile on a single-surface geometry.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { face: None, x, y, z }
    }

    /// A tile on one face of a cube geometry.
    #[must_use]
    pub const fn on_face(face: CubeFace, x: u32, y: u32, z: u32) -> Self {
        Self {
            face: Some(face),
            x,
            y,
            z,
        }
    }

    /// The same position on a different level.
    #[must_use]
    pub const fn with_level(self, z: u32) -> Self {
        Self { z, ..self }
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.face {
            Some(face) => write!(f, "{face}/{}/{}@{}", self.x, self.y, self.z),
            None => write!(f, "{}/{}@{}", self.x, self.y, self.z),
        }
    }
}

/// Set of tiles keyed by tile identity.
pub type TileSet = FxHashSet<Tile>;

/// Cardinal step within a tile grid as seen on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileDirection {
    /// Row above.
    Up,
    /// Row below.
    Down,
    /// Column to the left.
    Left,
    /// Column to the right.
    Right,
}

impl TileDirection {
    /// All four directions.
    pub const ALL: [TileDirection; 4] = [
        TileDirection::Up,
        TileDirection::Down,
        TileDirection::Left,
        TileDirection::Right,
    ];

    #[must_use]
    pub fn opposite(self) -> TileDirection {
        match self {
            TileDirection::Up => TileDirection::Down,
            TileDirection::Down => TileDirection::Up,
            TileDirection::Left => TileDirection::Right,
            TileDirection::Right => TileDirection::Left,
        }
    }

    /// Column and row offset of one step.
    #[must_use]
    pub fn offset(self) -> (i64, i64) {
        match self {
            TileDirection::Up => (0, -1),
            TileDirection::Down => (0, 1),
            TileDirection::Left => (-1, 0),
            TileDirection::Right => (1, 0),
        }
    }
}
