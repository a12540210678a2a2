//! Flat geometry: a planar image on `z = -1`.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use vista_core::{Level, Tile, TileDirection};

use crate::error::GeometryError;
use crate::geometry::{Geometry, validate_levels};

/// One level of a flat image pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatLevel {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default)]
    pub fallback_only: bool,
}

impl FlatLevel {
    #[must_use]
    pub const fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            fallback_only: false,
        }
    }

    fn to_level(self) -> Level {
        let level = Level::new(self.width, self.height, self.tile_width, self.tile_height);
        if self.fallback_only {
            level.fallback_only()
        } else {
            level
        }
    }
}

/// Planar geometry matching the layout used by flat views: `x` in
/// `[-0.5, 0.5]` left to right, `y` top to bottom scaled by the inverse of
/// the media aspect ratio (taken from the finest level).
#[derive(Clone, Debug)]
pub struct FlatGeometry {
    levels: Vec<Level>,
    media_aspect_ratio: f64,
}

impl FlatGeometry {
    pub fn new(levels: &[FlatLevel]) -> Result<Self, GeometryError> {
        let levels: Vec<Level> = levels.iter().map(|l| l.to_level()).collect();
        validate_levels(&levels)?;
        let finest = levels[levels.len() - 1];
        let media_aspect_ratio = f64::from(finest.width()) / f64::from(finest.height());
        tracing::debug!(levels = levels.len(), media_aspect_ratio, "flat geometry");
        Ok(Self {
            levels,
            media_aspect_ratio,
        })
    }

    /// Width over height of the image.
    #[must_use]
    pub fn media_aspect_ratio(&self) -> f64 {
        self.media_aspect_ratio
    }

    fn point(&self, u: f64, v: f64) -> DVec3 {
        DVec3::new(u - 0.5, (0.5 - v) / self.media_aspect_ratio, -1.0)
    }
}

impl Geometry for FlatGeometry {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn tile_vertices(&self, tile: Tile, out: &mut Vec<DVec3>) {
        let Some(level) = self.level(tile.z) else {
            return;
        };
        let e = level.extent(tile.x, tile.y);
        out.extend([
            self.point(e.u0, e.v0),
            self.point(e.u1, e.v0),
            self.point(e.u1, e.v1),
            self.point(e.u0, e.v1),
        ]);
    }

    fn tile_center(&self, tile: Tile) -> DVec3 {
        let Some(level) = self.level(tile.z) else {
            return self.point(0.5, 0.5);
        };
        let (u, v) = level.extent(tile.x, tile.y).center();
        self.point(u, v)
    }

    /// Points off the image resolve to the nearest edge tile.
    fn tile_at(&self, point: DVec3, z: u32) -> Option<Tile> {
        let level = self.level(z)?;
        let u = point.x + 0.5;
        let v = 0.5 - point.y * self.media_aspect_ratio;
        let (x, y) = level.tile_at(u, v);
        Some(Tile::new(x, y, z))
    }

    fn neighbor(&self, tile: Tile, direction: TileDirection) -> Option<Tile> {
        let level = self.level(tile.z)?;
        let (dx, dy) = direction.offset();
        let nx = i64::from(tile.x) + dx;
        let ny = i64::from(tile.y) + dy;
        let inside = (0..i64::from(level.cols())).contains(&nx)
            && (0..i64::from(level.rows())).contains(&ny);
        inside.then(|| Tile::new(nx as u32, ny as u32, tile.z))
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
    use vista_view::{FlatParams, FlatView, View};

    fn geometry() -> FlatGeometry {
        FlatGeometry::new(&[
            FlatLevel::new(500, 250, 256, 256),
            FlatLevel::new(1000, 500, 256, 256),
            FlatLevel::new(2000, 1000, 256, 256),
        ])
        .unwrap()
    }

    #[test]
    fn test_media_aspect_ratio_from_finest_level() {
        assert_eq!(geometry().media_aspect_ratio(), 2.0);
    }

    #[test]
    fn test_edges_have_no_neighbors() {
        let g = geometry();
        let corner = Tile::new(0, 0, 1);
        assert_eq!(g.neighbor(corner, TileDirection::Left), None);
        assert_eq!(g.neighbor(corner, TileDirection::Up), None);
        assert_eq!(g.neighbors(corner), vec![Tile::new(0, 1, 1), Tile::new(1, 0, 1)]);
        let last = Tile::new(3, 1, 1);
        assert_eq!(g.neighbor(last, TileDirection::Right), None);
        assert_eq!(g.neighbor(last, TileDirection::Down), None);
    }

    #[test]
    fn test_truncated_edge_tiles_have_no_gap() {
        let g = geometry();
        assert_eq!(g.tile_grid(1), Some((4, 2)));
        assert_eq!(g.tile_grid(3), None);
        let mut a = Vec::new();
        let mut b = Vec::new();
        g.tile_vertices(Tile::new(2, 0, 1), &mut a);
        g.tile_vertices(Tile::new(3, 0, 1), &mut b);
        assert_eq!(a[1], b[0]);
        // The truncated last column ends exactly at the right edge of the image.
        assert!((b[1].x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tile_at_clamps_to_image() {
        let g = geometry();
        assert_eq!(g.tile_at(DVec3::new(0.0, 0.0, -1.0), 2), Some(Tile::new(3, 1, 2)));
        assert_eq!(g.tile_at(DVec3::new(-4.0, 4.0, -1.0), 2), Some(Tile::new(0, 0, 2)));
        assert_eq!(g.tile_at(DVec3::new(4.0, -4.0, -1.0), 2), Some(Tile::new(7, 3, 2)));
    }

    #[test]
    fn test_parent_of_truncated_tile() {
        let g = geometry();
        assert_eq!(g.parent(Tile::new(7, 3, 2)), Some(Tile::new(3, 1, 1)));
        assert_eq!(g.parent(Tile::new(3, 1, 1)), Some(Tile::new(1, 0, 0)));
    }

    #[test]
    fn test_visible_tiles_follow_the_view() {
        let g = geometry();
        let mut view = FlatView::new(
            FlatParams {
                x: 0.125,
                y: 0.12,
                zoom: 0.2,
            },
            g.media_aspect_ratio(),
        );
        view.set_size(Size::new(200.0, 100.0));

        let mut result = Vec::new();
        g.visible_tiles(&view, 2, &mut result);
        assert_eq!(result, vec![Tile::new(0, 0, 2), Tile::new(1, 0, 2)]);
        assert_eq!(g.closest_tile(&view, 2), Some(Tile::new(0, 0, 2)));
    }
}
