//! Eviction ordering for stale, unpinned tiles.
//!
//! Each strategy turns a candidate into a score; higher scores are evicted
//! first. Candidates are removed in score order until the requested number
//! of bytes has been freed.

use std::cmp::Ordering;
use std::f64::consts::PI;

use glam::DVec3;
use vista_config::EvictionStrategy;
use vista_core::Tile;

/// Share of the hybrid score given to age; the rest goes to angular distance.
pub const HYBRID_AGE_WEIGHT: f64 = 0.5;

/// A resident texture that may be evicted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvictionCandidate {
    pub tile: Tile,
    pub bytes: u64,
    /// Last frame epoch in which the tile was marked.
    pub last_seen_epoch: u64,
    /// World-space centre of the tile.
    pub center: DVec3,
}

fn angle_to(focus: DVec3, center: DVec3) -> f64 {
    if focus.length_squared() == 0.0 || center.length_squared() == 0.0 {
        return 0.0;
    }
    focus.angle_between(center)
}

/// Score every candidate under `strategy`. `epoch` is the current frame
/// epoch and `focus` the current view direction.
#[must_use]
pub fn eviction_scores(
    candidates: &[EvictionCandidate],
    strategy: EvictionStrategy,
    epoch: u64,
    focus: DVec3,
) -> Vec<f64> {
    let age = |c: &EvictionCandidate| epoch.saturating_sub(c.last_seen_epoch) as f64;
    match strategy {
        EvictionStrategy::Lru => candidates.iter().map(age).collect(),
        EvictionStrategy::Distance => candidates
            .iter()
            .map(|c| angle_to(focus, c.center))
            .collect(),
        EvictionStrategy::Hybrid => {
            let max_age = candidates.iter().map(age).fold(0.0, f64::max);
            candidates
                .iter()
                .map(|c| {
                    let age_term = if max_age > 0.0 { age(c) / max_age } else { 0.0 };
                    let distance_term = angle_to(focus, c.center) / PI;
                    HYBRID_AGE_WEIGHT * age_term + (1.0 - HYBRID_AGE_WEIGHT) * distance_term
                })
                .collect()
        }
    }
}

/// Pick tiles to evict, best candidates first, until at least `overage`
/// bytes are freed. Returns nothing when `overage` is 0; returns every
/// candidate when even that is not enough.
#[must_use]
pub fn select_evictions(
    candidates: &[EvictionCandidate],
    overage: u64,
    strategy: EvictionStrategy,
    epoch: u64,
    focus: DVec3,
) -> Vec<Tile> {
    if overage == 0 {
        return Vec::new();
    }

    let scores = eviction_scores(candidates, strategy, epoch, focus);
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // Highest score first; ties resolve by tile so the order is stable.
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| candidates[a].tile.cmp(&candidates[b].tile))
    });

    let mut freed = 0u64;
    let mut evictions = Vec::new();
    for index in order {
        if freed >= overage {
            break;
        }
        freed += candidates[index].bytes;
        evictions.push(candidates[index].tile);
    }
    evictions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: u32, last_seen_epoch: u64, center: DVec3) -> EvictionCandidate {
        EvictionCandidate {
            tile: Tile::new(x, 0, 0),
            bytes: 100,
            last_seen_epoch,
            center,
        }
    }

    fn candidates() -> Vec<EvictionCandidate> {
        vec![
            // Recent but behind the viewer.
            candidate(0, 9, DVec3::Z),
            // Old and straight ahead.
            candidate(1, 1, DVec3::NEG_Z),
            // Middle-aged, off to the side.
            candidate(2, 5, DVec3::X),
        ]
    }

    #[test]
    fn test_lru_evicts_oldest_first() {
        let tiles = select_evictions(&candidates(), 150, EvictionStrategy::Lru, 10, DVec3::NEG_Z);
        assert_eq!(tiles, vec![Tile::new(1, 0, 0), Tile::new(2, 0, 0)]);
    }

    #[test]
    fn test_distance_evicts_farthest_first() {
        let tiles = select_evictions(&candidates(), 1, EvictionStrategy::Distance, 10, DVec3::NEG_Z);
        assert_eq!(tiles, vec![Tile::new(0, 0, 0)]);
    }

    #[test]
    fn test_hybrid_blends_age_and_distance() {
        let scores = eviction_scores(&candidates(), EvictionStrategy::Hybrid, 10, DVec3::NEG_Z);
        // ages 1, 9, 5 over max 9; angles π, 0, π/2.
        assert!((scores[0] - (0.5 / 9.0 + 0.5)).abs() < 1e-12);
        assert!((scores[1] - 0.5).abs() < 1e-12);
        assert!((scores[2] - (0.5 * 5.0 / 9.0 + 0.25)).abs() < 1e-12);

        let tiles = select_evictions(&candidates(), 1, EvictionStrategy::Hybrid, 10, DVec3::NEG_Z);
        assert_eq!(tiles, vec![Tile::new(0, 0, 0)]);
    }

    #[test]
    fn test_nothing_to_free() {
        assert!(select_evictions(&candidates(), 0, EvictionStrategy::Lru, 10, DVec3::NEG_Z).is_empty());
    }

    #[test]
    fn test_insufficient_candidates_evicts_all() {
        let tiles = select_evictions(&candidates(), 10_000, EvictionStrategy::Lru, 10, DVec3::NEG_Z);
        assert_eq!(tiles.len(), 3);
    }

    #[test]
    fn test_ties_resolve_by_tile() {
        let same_age = vec![
            candidate(3, 2, DVec3::Z),
            candidate(1, 2, DVec3::Z),
            candidate(2, 2, DVec3::Z),
        ];
        let tiles = select_evictions(&same_age, 300, EvictionStrategy::Lru, 5, DVec3::NEG_Z);
        assert_eq!(
            tiles,
            vec![Tile::new(1, 0, 0), Tile::new(2, 0, 0), Tile::new(3, 0, 0)]
        );
    }
}
