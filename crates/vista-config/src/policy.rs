//! Level-of-detail policy: how much GPU memory the texture cache may hold,
//! how far ahead to prefetch, and which tiles to give up first.

use serde::{Deserialize, Serialize};

/// Order in which stale, unpinned tiles are evicted once the cache exceeds
/// its budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently marked first.
    #[default]
    Lru,
    /// Farthest from the current view direction first.
    Distance,
    /// Weighted blend of age and angular distance.
    Hybrid,
}

impl EvictionStrategy {
    /// The lowercase name used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Distance => "distance",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain configuration record. Carries no behavior beyond a byte conversion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodPolicy {
    /// GPU texture budget in megabytes (1 MB = 1024 * 1024 bytes).
    pub max_gpu_mb: f64,
    /// Number of neighbor rings around the visible set to load ahead of time.
    pub prefetch_ahead: u32,
    /// Eviction order under budget pressure.
    pub eviction_strategy: EvictionStrategy,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            max_gpu_mb: 256.0,
            prefetch_ahead: 0,
            eviction_strategy: EvictionStrategy::Lru,
        }
    }
}

impl LodPolicy {
    /// The budget expressed in bytes. Negative budgets are treated as zero.
    #[must_use]
    pub fn max_gpu_bytes(&self) -> u64 {
        (self.max_gpu_mb.max(0.0) * 1024.0 * 1024.0) as u64
    }
}
