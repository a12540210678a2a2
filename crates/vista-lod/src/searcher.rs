//! Flood-fill search for the tiles a view can see.
//!
//! Starting from a tile known (or expected) to be visible, the search walks
//! neighbor links breadth first and only expands through tiles that pass the
//! view's frustum test. This visits the visible set plus its one-tile rim
//! instead of every tile in the level.
//!
//! The search assumes the visible tiles of a level form one edge-connected
//! region. That holds for the geometries in this workspace because a view's
//! frustum is convex and every geometry's tiles tile a connected surface. A
//! geometry with disjoint visible islands would need one search per island,
//! or the exhaustive [`Geometry::visible_tiles`] scan.

use std::collections::VecDeque;

use glam::DVec3;
use vista_core::{Tile, TileDirection, TileSet, ViewFrustum};
use vista_geometry::Geometry;

/// Reusable visible-tile search. The buffers persist between calls to avoid
/// reallocating every frame; their contents do not.
#[derive(Debug, Default)]
pub struct TileSearcher {
    visited: TileSet,
    queue: VecDeque<Tile>,
    vertices: Vec<DVec3>,
}

impl TileSearcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every tile reachable from `start` through visible tiles to
    /// `result`, nearest first, and return how many were appended.
    ///
    /// Returns 0 without touching `result` if `start` is not visible or not
    /// part of `geometry`. Existing entries of `result` are kept.
    pub fn search(
        &mut self,
        view: &dyn ViewFrustum,
        geometry: &dyn Geometry,
        start: Tile,
        result: &mut Vec<Tile>,
    ) -> usize {
        self.visited.clear();
        self.queue.clear();

        if !geometry.contains(start) || !geometry.intersects(view, start, &mut self.vertices) {
            return 0;
        }

        let before = result.len();
        self.visited.insert(start);
        self.queue.push_back(start);

        while let Some(tile) = self.queue.pop_front() {
            result.push(tile);
            for direction in TileDirection::ALL {
                let Some(next) = geometry.neighbor(tile, direction) else {
                    continue;
                };
                // Rejected tiles stay visited so their rim is tested once.
                if self.visited.insert(next) && geometry.intersects(view, next, &mut self.vertices)
                {
                    self.queue.push_back(next);
                }
            }
        }

        result.len() - before
    }

    /// Search level `z` starting from the tile under the view centre.
    ///
    /// Falls back to the exhaustive scan when that tile is not visible,
    /// which only happens for degenerate viewports.
    pub fn search_visible(
        &mut self,
        view: &dyn ViewFrustum,
        geometry: &dyn Geometry,
        z: u32,
        result: &mut Vec<Tile>,
    ) -> usize {
        if let Some(start) = geometry.closest_tile(view, z) {
            let found = self.search(view, geometry, start, result);
            if found > 0 {
                return found;
            }
            tracing::debug!(%start, "centre tile not visible, scanning level {z}");
        }
        geometry.visible_tiles(view, z, result)
    }
}
