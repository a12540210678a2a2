//! Tile texture cache for the Vista streaming core.
//!
//! [`TextureStore`] tracks which tiles are wanted each frame (mark and
//! sweep), drives asynchronous loads through a [`Source`] and a [`Backend`],
//! and keeps resident texture memory within the [`LodPolicy`] budget.
//!
//! [`LodPolicy`]: vista_lod::LodPolicy

mod asset;
mod completion;
mod error;
mod file_source;
mod source;
mod store;

pub use asset::{Asset, DynamicAsset, ImageAsset};
pub use completion::{CancelHandle, CancelToken, Completed, Completion, Ticket};
pub use error::{LoadError, StoreError};
pub use file_source::FileSource;
pub use source::{Backend, Source};
pub use store::{
    LoadStatus, StoreEvent, StoreOptions, StoreStats, TextureStore, TileLocator, TileState,
};
