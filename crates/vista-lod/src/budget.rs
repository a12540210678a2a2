//! GPU memory budget accounting for resident tile textures.

use vista_config::LodPolicy;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Running total of texture bytes against a fixed limit.
///
/// Only the texture store mutates it, once per texture creation and once per
/// destruction, so the total always equals the sum over resident textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryBudget {
    limit_bytes: u64,
    resident_bytes: u64,
}

impl MemoryBudget {
    #[must_use]
    pub fn new(limit_bytes: u64) -> Self {
        Self {
            limit_bytes,
            resident_bytes: 0,
        }
    }

    #[must_use]
    pub fn from_policy(policy: &LodPolicy) -> Self {
        Self::new(policy.max_gpu_bytes())
    }

    pub fn set_limit(&mut self, limit_bytes: u64) {
        self.limit_bytes = limit_bytes;
    }

    /// Record a texture upload.
    pub fn on_texture_created(&mut self, bytes: u64) {
        self.resident_bytes += bytes;
    }

    /// Record a texture release.
    pub fn on_texture_destroyed(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.resident_bytes, "releasing untracked bytes");
        self.resident_bytes = self.resident_bytes.saturating_sub(bytes);
    }

    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.resident_bytes > self.limit_bytes
    }

    /// Bytes above the limit, 0 when within budget.
    #[must_use]
    pub fn overage(&self) -> u64 {
        self.resident_bytes.saturating_sub(self.limit_bytes)
    }

    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    #[must_use]
    pub fn resident_mb(&self) -> f64 {
        self.resident_bytes as f64 / BYTES_PER_MB
    }

    #[must_use]
    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }
}
