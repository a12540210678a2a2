use glam::DVec3;

use crate::level::Level;

/// What a geometry needs to know about a view to decide tile visibility.
pub trait ViewFrustum {
    /// True if the convex volume spanned by `vertices` may be visible.
    /// Conservative: false positives are allowed, false negatives are not.
    fn intersects(&self, vertices: &[DVec3]) -> bool;

    /// Unit direction (or image-plane point) at the centre of the viewport.
    fn center(&self) -> DVec3;

    /// Index of the level to display for the current parameters, `None` if
    /// no level is selectable.
    fn select_level(&self, levels: &[Level]) -> Option<usize>;
}
