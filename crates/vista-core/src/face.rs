//! The six faces of a cube map and their basis vectors.
//!
//! Faces are named from the viewer's perspective at the cube centre: at
//! yaw 0 the viewer looks at `Front` (−Z). Each face carries a `right` and
//! `down` vector spanning its image so that tile column and row indices grow
//! rightwards and downwards as seen by a viewer facing it upright.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// One face of a cube-mapped panorama.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CubeFace {
    /// −Z, ahead at yaw 0.
    Front = 0,
    /// +X, to the right.
    Right = 1,
    /// +Z, behind.
    Back = 2,
    /// −X, to the left.
    Left = 3,
    /// +Y, above.
    Up = 4,
    /// −Y, below.
    Down = 5,
}

impl CubeFace {
    /// All six faces in canonical order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Front,
        CubeFace::Right,
        CubeFace::Back,
        CubeFace::Left,
        CubeFace::Up,
        CubeFace::Down,
    ];

    /// The opposite face (e.g., `Front` → `Back`).
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::Front => CubeFace::Back,
            CubeFace::Back => CubeFace::Front,
            CubeFace::Left => CubeFace::Right,
            CubeFace::Right => CubeFace::Left,
            CubeFace::Up => CubeFace::Down,
            CubeFace::Down => CubeFace::Up,
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::Front => DVec3::NEG_Z,
            CubeFace::Back => DVec3::Z,
            CubeFace::Left => DVec3::NEG_X,
            CubeFace::Right => DVec3::X,
            CubeFace::Up => DVec3::Y,
            CubeFace::Down => DVec3::NEG_Y,
        }
    }

    /// Direction of increasing tile column on this face.
    #[must_use]
    pub fn right(self) -> DVec3 {
        match self {
            CubeFace::Front => DVec3::X,
            CubeFace::Back => DVec3::NEG_X,
            CubeFace::Left => DVec3::NEG_Z,
            CubeFace::Right => DVec3::Z,
            CubeFace::Up | CubeFace::Down => DVec3::X,
        }
    }

    /// Direction of increasing tile row on this face.
    #[must_use]
    pub fn down(self) -> DVec3 {
        match self {
            CubeFace::Up => DVec3::NEG_Z,
            CubeFace::Down => DVec3::Z,
            _ => DVec3::NEG_Y,
        }
    }

    /// Point on the unit cube for face coordinates `s` (right) and `t` (down),
    /// both in `[-1, 1]` on the face itself.
    #[must_use]
    pub fn point(self, s: f64, t: f64) -> DVec3 {
        self.normal() + self.right() * s + self.down() * t
    }

    /// The single-letter name used in tile URLs (`f`, `r`, `b`, `l`, `u`, `d`).
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            CubeFace::Front => 'f',
            CubeFace::Right => 'r',
            CubeFace::Back => 'b',
            CubeFace::Left => 'l',
            CubeFace::Up => 'u',
            CubeFace::Down => 'd',
        }
    }

    /// Parse the single-letter face name.
    #[must_use]
    pub fn from_char(c: char) -> Option<CubeFace> {
        CubeFace::ALL.into_iter().find(|face| face.as_char() == c)
    }
}

impl std::fmt::Display for CubeFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Determine which cube face a direction vector points through.
///
/// The face is determined by the axis with the largest absolute component.
/// Ties are broken by a fixed priority: X > Y > Z. A zero vector maps to
/// [`CubeFace::Front`].
#[must_use]
pub fn direction_to_face(dir: DVec3) -> CubeFace {
    let ax = dir.x.abs();
    let ay = dir.y.abs();
    let az = dir.z.abs();

    if ax == 0.0 && ay == 0.0 && az == 0.0 {
        CubeFace::Front
    } else if ax >= ay && ax >= az {
        if dir.x >= 0.0 { CubeFace::Right } else { CubeFace::Left }
    } else if ay >= az {
        if dir.y >= 0.0 { CubeFace::Up } else { CubeFace::Down }
    } else if dir.z >= 0.0 {
        CubeFace::Back
    } else {
        CubeFace::Front
    }
}

/// Project a direction onto its cube face, returning the face and the
/// `(s, t)` face coordinates in `[-1, 1]`.
#[must_use]
pub fn direction_to_face_coord(dir: DVec3) -> (CubeFace, f64, f64) {
    let face = direction_to_face(dir);
    let d = dir.dot(face.normal());
    if d.abs() < 1e-30 {
        return (face, 0.0, 0.0);
    }
    let projected = dir / d;
    (face, projected.dot(face.right()), projected.dot(face.down()))
}
