//! The two external collaborators of the store: where pixels come from
//! and where textures live.

use vista_core::Tile;

use crate::asset::Asset;
use crate::completion::{CancelHandle, Completion};

/// Produces decoded assets for tiles.
///
/// `load_asset` must not block. It resolves `completion` later (possibly
/// from another thread), immediately, or never, and returns a handle the
/// store uses to abort the load.
pub trait Source {
    type Asset: Asset + Send + 'static;

    fn load_asset(&mut self, tile: Tile, completion: Completion<Self::Asset>) -> CancelHandle;
}

/// Creates and destroys GPU textures from assets.
pub trait Backend<A: Asset> {
    type Texture;

    /// Start creating a texture for `asset`, resolving `completion` when done.
    ///
    /// A texture handed back by [`Completion::succeed`] was cancelled in the
    /// meantime and belongs to the backend again, which must destroy it.
    fn create_texture(
        &mut self,
        tile: Tile,
        asset: &A,
        completion: Completion<Self::Texture>,
    ) -> CancelHandle;

    /// Re-upload a dynamic asset whose content changed.
    fn refresh_texture(&mut self, tile: Tile, texture: &mut Self::Texture, asset: &A);

    fn destroy_texture(&mut self, tile: Tile, texture: Self::Texture);
}
