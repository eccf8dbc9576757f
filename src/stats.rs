//! Point-in-time pool statistics.

/// Snapshot of a pool's occupancy and counters.
///
/// Counters are read with relaxed ordering while other threads may be
/// claiming and releasing, so the fields are only mutually consistent when
/// the pool is quiescent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes per buffer.
    pub slot_capacity: usize,
    /// Number of shards.
    pub shard_count: usize,
    /// Slots owned by each shard.
    pub slots_per_shard: usize,
    /// Slots currently claimed across all shards.
    pub occupied_slots: usize,
    /// Buffers allocated outside any slab because a shard was saturated.
    pub fallback_allocations: u64,
    /// `put` calls that found their slot already free.
    pub misuse_releases: u64,
}

impl PoolStats {
    /// Slots across all shards.
    #[must_use]
    pub const fn total_slots(&self) -> usize {
        self.shard_count * self.slots_per_shard
    }

    /// Slots currently free.
    #[must_use]
    pub const fn available_slots(&self) -> usize {
        self.total_slots().saturating_sub(self.occupied_slots)
    }

    /// Fraction of slots claimed, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        match self.total_slots() {
            0 => 0.0,
            total => self.occupied_slots as f64 / total as f64,
        }
    }
}
