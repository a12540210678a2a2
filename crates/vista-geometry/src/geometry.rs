//! The geometry contract shared by every projection family.

use glam::DVec3;
use vista_core::{Level, Tile, TileDirection, TileSet, ViewFrustum};

use crate::error::GeometryError;

/// Level list, tile placement and adjacency for one projection family.
///
/// Every tile lives on a rectangular `(u, v)` grid described by its
/// [`Level`]; cube tiles carry the face that grid belongs to. Parent and
/// child relations are resolved through normalized grid coordinates, so a
/// tile's bounding volume lies inside its parent's whenever the level grids
/// nest (each coarse tile edge is also a fine tile edge).
pub trait Geometry {
    /// Levels ordered from coarsest to finest.
    fn levels(&self) -> &[Level];

    /// Bounding volume of `tile` as world-space vertices, appended to `out`.
    fn tile_vertices(&self, tile: Tile, out: &mut Vec<DVec3>);

    /// World-space point at the centre of `tile`.
    fn tile_center(&self, tile: Tile) -> DVec3;

    /// Tile on level `z` containing the world-space direction or point
    /// closest to `point`.
    fn tile_at(&self, point: DVec3, z: u32) -> Option<Tile>;

    /// Adjacent tile on the same level, `None` past a hard edge.
    fn neighbor(&self, tile: Tile, direction: TileDirection) -> Option<Tile>;

    /// Every tile of level `z`, appended to `out`.
    fn tiles(&self, z: u32, out: &mut Vec<Tile>);

    fn level(&self, z: u32) -> Option<&Level> {
        self.levels().get(z as usize)
    }

    /// Columns and rows of level `z`'s tile grid, per face for cubes.
    fn tile_grid(&self, z: u32) -> Option<(u32, u32)> {
        self.level(z).map(|level| (level.cols(), level.rows()))
    }

    /// True if `tile` addresses a tile of this geometry.
    fn contains(&self, tile: Tile) -> bool {
        self.level(tile.z)
            .is_some_and(|level| tile.x < level.cols() && tile.y < level.rows())
    }

    /// Distinct adjacent tiles in all four directions.
    fn neighbors(&self, tile: Tile) -> Vec<Tile> {
        let mut out = Vec::with_capacity(4);
        for direction in TileDirection::ALL {
            if let Some(next) = self.neighbor(tile, direction)
                && next != tile
                && !out.contains(&next)
            {
                out.push(next);
            }
        }
        out
    }

    /// The tile one level coarser whose area contains this tile's centre.
    fn parent(&self, tile: Tile) -> Option<Tile> {
        let z = tile.z.checked_sub(1)?;
        let level = self.level(tile.z)?;
        let coarse = self.level(z)?;
        let (u, v) = level.extent(tile.x, tile.y).center();
        let (x, y) = coarse.tile_at(u, v);
        Some(Tile { x, y, z, ..tile })
    }

    /// Tiles one level finer whose parent is `tile`.
    fn children(&self, tile: Tile) -> Vec<Tile> {
        let (Some(level), Some(fine)) = (self.level(tile.z), self.level(tile.z + 1)) else {
            return Vec::new();
        };
        let extent = level.extent(tile.x, tile.y);
        let (x0, y0) = fine.tile_at(extent.u0, extent.v0);
        let (x1, y1) = fine.tile_at(extent.u1, extent.v1);
        let mut out = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let child = Tile {
                    x,
                    y,
                    z: tile.z + 1,
                    ..tile
                };
                if self.parent(child) == Some(tile) {
                    out.push(child);
                }
            }
        }
        out
    }

    /// Frustum test for one tile; `scratch` is reused for its vertices.
    fn intersects(&self, view: &dyn ViewFrustum, tile: Tile, scratch: &mut Vec<DVec3>) -> bool {
        scratch.clear();
        self.tile_vertices(tile, scratch);
        view.intersects(scratch)
    }

    /// Exhaustive scan of level `z`: appends every tile whose bounding
    /// volume intersects the view and returns how many were appended.
    fn visible_tiles(&self, view: &dyn ViewFrustum, z: u32, result: &mut Vec<Tile>) -> usize {
        let mut all = Vec::new();
        self.tiles(z, &mut all);
        let mut scratch = Vec::new();
        let before = result.len();
        result.extend(
            all.into_iter()
                .filter(|&tile| self.intersects(view, tile, &mut scratch)),
        );
        result.len() - before
    }

    /// Tile under the centre of the view, the usual search start.
    fn closest_tile(&self, view: &dyn ViewFrustum, z: u32) -> Option<Tile> {
        self.tile_at(view.center(), z)
    }

    /// Level the view wants displayed.
    fn select_level(&self, view: &dyn ViewFrustum) -> Option<u32> {
        view.select_level(self.levels()).map(|z| z as u32)
    }

    /// The coarsest level, used as a fallback while finer tiles load.
    fn fallback_level(&self) -> u32 {
        0
    }

    /// Ancestors of `tile` from its parent up to level 0.
    fn ancestors(&self, tile: Tile) -> Vec<Tile> {
        let mut out = Vec::new();
        let mut current = tile;
        while let Some(parent) = self.parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Tiles reachable from `seeds` in at most `rings` neighbor steps,
    /// excluding the seeds themselves.
    fn rings(&self, seeds: &[Tile], rings: u32) -> Vec<Tile> {
        let mut seen: TileSet = seeds.iter().copied().collect();
        let mut frontier = seeds.to_vec();
        let mut out = Vec::new();
        for _ in 0..rings {
            let mut next = Vec::new();
            for tile in &frontier {
                for neighbor in self.neighbors(*tile) {
                    if seen.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            out.extend_from_slice(&next);
            frontier = next;
        }
        out
    }
}

/// Checks shared by every geometry. A tile may be larger than its level; it
/// is then truncated to the image like any edge tile.
pub(crate) fn validate_levels(levels: &[Level]) -> Result<(), GeometryError> {
    if levels.is_empty() {
        return Err(GeometryError::NoLevels);
    }
    for (index, level) in levels.iter().enumerate() {
        if level.width() == 0
            || level.height() == 0
            || level.tile_width() == 0
            || level.tile_height() == 0
        {
            return Err(GeometryError::ZeroDimension { level: index });
        }
        if index > 0 {
            let prev = &levels[index - 1];
            if level.width() <= prev.width() || level.height() < prev.height() {
                return Err(GeometryError::NotIncreasing { level: index });
            }
        }
    }
    if !levels.iter().any(Level::is_selectable) {
        return Err(GeometryError::NoSelectableLevel);
    }
    Ok(())
}
