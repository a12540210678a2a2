//! Level-of-detail management: visible-tile search, GPU memory budget
//! accounting, and eviction ordering under the configured policy.

mod budget;
mod eviction;
mod searcher;

pub use budget::MemoryBudget;
pub use eviction::{EvictionCandidate, HYBRID_AGE_WEIGHT, eviction_scores, select_evictions};
pub use searcher::TileSearcher;
pub use vista_config::{EvictionStrategy, LodPolicy};
