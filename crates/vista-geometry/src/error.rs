//! Geometry configuration errors.

/// Reasons a level list cannot form a geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The level list is empty.
    #[error("geometry needs at least one level")]
    NoLevels,

    /// A level or tile dimension is zero.
    #[error("level {level} has a zero dimension")]
    ZeroDimension { level: usize },

    /// Levels must grow strictly in resolution.
    #[error("level {level} is not larger than the level before it")]
    NotIncreasing { level: usize },

    /// Every level is marked fallback-only.
    #[error("no selectable level")]
    NoSelectableLevel,
}
