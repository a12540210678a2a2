//! One image layer: view, geometry and texture store driven frame by frame.

use std::rc::Rc;

use tracing::{debug, trace};
use vista_core::{Tile, TileSet, ViewFrustum};
use vista_geometry::Geometry;
use vista_lod::TileSearcher;
use vista_texture::{Backend, Source, StoreError, TextureStore};
use vista_view::View;

/// What to draw for one frame, coarse tiles first.
///
/// Visible tiles whose texture is not ready yet are covered by their
/// nearest loaded ancestor, so `tiles` may mix levels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    /// Level selected for the frame, `None` when nothing is displayable.
    pub level: Option<u32>,
    /// Tiles with a ready texture, ordered by level then position.
    pub tiles: Vec<Tile>,
    /// Tiles found visible at the selected level.
    pub visible: usize,
    /// Visible tiles with neither a texture nor a loaded ancestor.
    pub missing: usize,
}

impl FramePlan {
    /// Every visible tile is drawn at the selected level.
    pub fn is_complete(&self) -> bool {
        self.level.is_some()
            && self.missing == 0
            && self.tiles.len() == self.visible
            && self.tiles.iter().all(|tile| Some(tile.z) == self.level)
    }
}

pub struct Layer<V, G, S, B>
where
    V: View,
    G: Geometry + 'static,
    S: Source,
    B: Backend<S::Asset>,
{
    view: V,
    geometry: Rc<G>,
    store: TextureStore<S, B>,
    searcher: TileSearcher,
    fixed_level: Option<u32>,
    visible: Vec<Tile>,
    fallback: Vec<Tile>,
    plan: FramePlan,
}

impl<V, G, S, B> Layer<V, G, S, B>
where
    V: View,
    G: Geometry + 'static,
    S: Source,
    B: Backend<S::Asset>,
{
    pub fn new(view: V, geometry: G, mut store: TextureStore<S, B>) -> Self {
        let geometry = Rc::new(geometry);
        let locator = Rc::clone(&geometry);
        store.set_locator(Box::new(move |tile: Tile| locator.tile_center(tile)));
        Self {
            view,
            geometry,
            store,
            searcher: TileSearcher::new(),
            fixed_level: None,
            visible: Vec::new(),
            fallback: Vec::new(),
            plan: FramePlan::default(),
        }
    }

    /// Run one frame of the tile pipeline and return the draw plan.
    pub fn update(&mut self) -> &FramePlan {
        self.store.start_frame();
        self.store.set_focus(self.view.center());

        self.visible.clear();
        self.fallback.clear();
        let level = self
            .fixed_level
            .or_else(|| self.geometry.select_level(&self.view));

        if let Some(z) = level {
            self.searcher
                .search_visible(&self.view, &*self.geometry, z, &mut self.visible);
            for &tile in &self.visible {
                self.store.mark_tile(tile);
            }

            let rings = self.store.policy().prefetch_ahead;
            if rings > 0 {
                let ahead = self.geometry.rings(&self.visible, rings);
                trace!(count = ahead.len(), rings, "Prefetching tiles");
                for tile in ahead {
                    self.store.mark_tile(tile);
                }
            }

            let fallback_z = self.geometry.fallback_level();
            if fallback_z != z {
                self.searcher.search_visible(
                    &self.view,
                    &*self.geometry,
                    fallback_z,
                    &mut self.fallback,
                );
                for &tile in &self.fallback {
                    self.store.mark_tile(tile);
                }
            }
        } else {
            debug!("No selectable level for the current view");
        }

        self.store.end_frame();
        self.build_plan(level);
        &self.plan
    }

    fn build_plan(&mut self, level: Option<u32>) {
        let mut drawn = TileSet::default();
        let mut tiles = Vec::with_capacity(self.visible.len());
        let mut missing = 0;
        for &tile in &self.visible {
            if self.store.texture(tile).is_some() {
                if drawn.insert(tile) {
                    tiles.push(tile);
                }
                continue;
            }
            let cover = self
                .geometry
                .ancestors(tile)
                .into_iter()
                .find(|ancestor| self.store.texture(*ancestor).is_some());
            match cover {
                Some(ancestor) => {
                    if drawn.insert(ancestor) {
                        tiles.push(ancestor);
                    }
                }
                None => missing += 1,
            }
        }
        tiles.sort_unstable_by_key(|tile| (tile.z, tile.face, tile.y, tile.x));

        self.plan = FramePlan {
            level,
            tiles,
            visible: self.visible.len(),
            missing,
        };
    }

    /// Force a level instead of selecting one from the view.
    pub fn set_fixed_level(&mut self, level: Option<u32>) {
        self.fixed_level = level;
    }

    pub fn fixed_level(&self) -> Option<u32> {
        self.fixed_level
    }

    /// Pin every tile of level `z`, keeping it resident regardless of
    /// visibility. Returns the number of tiles pinned.
    pub fn pin_level(&mut self, z: u32) -> usize {
        let mut tiles = Vec::new();
        self.geometry.tiles(z, &mut tiles);
        for &tile in &tiles {
            self.store.pin(tile);
        }
        tiles.len()
    }

    /// Release one pin on every tile of level `z`. Nothing is released
    /// unless every tile of the level is pinned.
    pub fn unpin_level(&mut self, z: u32) -> Result<(), StoreError> {
        let mut tiles = Vec::new();
        self.geometry.tiles(z, &mut tiles);
        if let Some(&unpinned) = tiles
            .iter()
            .find(|tile| !self.store.query(**tile).is_some_and(|state| state.is_pinned()))
        {
            return Err(StoreError::NotPinned(unpinned));
        }
        for tile in tiles {
            self.store.unpin(tile)?;
        }
        Ok(())
    }

    /// Pin the coarsest level so something is always drawable.
    pub fn pin_first_level(&mut self) -> usize {
        self.pin_level(self.geometry.fallback_level())
    }

    /// Tiles found visible in the last update.
    pub fn visible_tiles(&self) -> &[Tile] {
        &self.visible
    }

    pub fn plan(&self) -> &FramePlan {
        &self.plan
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn store(&self) -> &TextureStore<S, B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TextureStore<S, B> {
        &mut self.store
    }
}
