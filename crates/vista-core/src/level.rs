//! Resolution levels and their tile grids.

use serde::{Deserialize, Serialize};

/// One resolution level: a full image of `width × height` pixels cut into
/// tiles of `tile_width × tile_height`. The last column and row are
/// truncated when the tile size does not divide the image size.
///
/// Validation happens where levels are assembled into a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    face_size: u32,
    fallback_only: bool,
}

/// Normalized `[0, 1]` extent of a tile within its level, v growing downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileExtent {
    pub u0: f64,
    pub v0: f64,
    pub u1: f64,
    pub v1: f64,
}

impl TileExtent {
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        ((self.u0 + self.u1) * 0.5, (self.v0 + self.v1) * 0.5)
    }
}

impl Level {
    /// A selectable level whose equivalent face size is its height.
    #[must_use]
    pub const fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            face_size: height,
            fallback_only: false,
        }
    }

    /// Override the cube-face-equivalent pixel size used by rectilinear
    /// level selection.
    #[must_use]
    pub const fn with_face_size(mut self, face_size: u32) -> Self {
        self.face_size = face_size;
        self
    }

    /// Mark the level as usable only as a fallback, never selected for display.
    #[must_use]
    pub const fn fallback_only(mut self) -> Self {
        self.fallback_only = true;
        self
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn tile_width(&self) -> u32 {
        self.tile_width
    }

    #[must_use]
    pub const fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Pixels a 90° span of this level resolves to.
    #[must_use]
    pub const fn face_size(&self) -> u32 {
        self.face_size
    }

    #[must_use]
    pub const fn is_fallback_only(&self) -> bool {
        self.fallback_only
    }

    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        !self.fallback_only
    }

    /// Number of tile columns.
    #[must_use]
    pub fn cols(&self) -> u32 {
        self.width.div_ceil(self.tile_width.max(1))
    }

    /// Number of tile rows.
    #[must_use]
    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.tile_height.max(1))
    }

    #[must_use]
    pub fn tile_count(&self) -> u64 {
        u64::from(self.cols()) * u64::from(self.rows())
    }

    /// Normalized extent of tile `(x, y)`. Out-of-range indices are clamped
    /// to the last column/row.
    #[must_use]
    pub fn extent(&self, x: u32, y: u32) -> TileExtent {
        let x = x.min(self.cols().saturating_sub(1));
        let y = y.min(self.rows().saturating_sub(1));
        let w = f64::from(self.width.max(1));
        let h = f64::from(self.height.max(1));
        let tw = u64::from(self.tile_width);
        let th = u64::from(self.tile_height);
        TileExtent {
            u0: (u64::from(x) * tw) as f64 / w,
            v0: (u64::from(y) * th) as f64 / h,
            u1: ((u64::from(x) + 1) * tw).min(u64::from(self.width)) as f64 / w,
            v1: ((u64::from(y) + 1) * th).min(u64::from(self.height)) as f64 / h,
        }
    }

    /// Column and row of the tile containing the normalized point `(u, v)`.
    #[must_use]
    pub fn tile_at(&self, u: f64, v: f64) -> (u32, u32) {
        let col = (u.clamp(0.0, 1.0) * f64::from(self.width) / f64::from(self.tile_width.max(1)))
            .floor() as u32;
        let row = (v.clamp(0.0, 1.0) * f64::from(self.height) / f64::from(self.tile_height.max(1)))
            .floor() as u32;
        (
            col.min(self.cols().saturating_sub(1)),
            row.min(self.rows().saturating_sub(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_counts_with_truncation() {
        let level = Level::new(1000, 600, 256, 256);
        assert_eq!(level.cols(), 4);
        assert_eq!(level.rows(), 3);
        assert_eq!(level.tile_count(), 12);
    }

    #[test]
    fn test_extents_partition_the_level() {
        let level = Level::new(1000, 600, 256, 256);
        let last = level.extent(3, 2);
        assert_eq!(last.u1, 1.0);
        assert_eq!(last.v1, 1.0);
        assert!((last.u0 - 0.768).abs() < 1e-12);
        // Adjacent tiles share their edge exactly.
        for x in 0..3 {
            assert_eq!(level.extent(x, 0).u1, level.extent(x + 1, 0).u0);
        }
    }

    #[test]
    fn test_tile_at_inverts_extent_center() {
        let level = Level::new(1000, 600, 256, 256);
        for x in 0..level.cols() {
            for y in 0..level.rows() {
                let (u, v) = level.extent(x, y).center();
                assert_eq!(level.tile_at(u, v), (x, y));
            }
        }
        assert_eq!(level.tile_at(1.0, 1.0), (3, 2));
        assert_eq!(level.tile_at(-0.5, 2.0), (0, 2));
    }

    #[test]
    fn test_flags_and_face_size() {
        let level = Level::new(4096, 2048, 512, 512).with_face_size(1024);
        assert_eq!(level.face_size(), 1024);
        assert!(level.is_selectable());
        assert!(level.fallback_only().is_fallback_only());
    }
}
