use std::io;

use thiserror::Error;
use vista_core::Tile;

/// Why a tile's asset or texture could not be produced.
///
/// Load errors never escape the store: the entry is marked failed for the
/// current frame and retried when the tile is next marked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Tile image not found: {0}")]
    NotFound(String),

    #[error("Failed to read tile image: {0}")]
    Io(String),

    #[error("Failed to decode tile image: {0}")]
    Decode(String),

    #[error("Failed to create texture: {0}")]
    Texture(String),
}

/// Errors from texture store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Tile {0} is not pinned")]
    NotPinned(Tile),

    #[error("Failed to spawn tile loader thread: {0}")]
    SpawnWorker(#[source] io::Error),
}
