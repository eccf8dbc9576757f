//! Pool sizing configuration.

use crate::error::{Error, Result};

/// Default per-buffer capacity (4 KiB).
pub const DEFAULT_SLOT_CAPACITY: usize = 4 * 1024;

/// Default number of slots across all shards.
pub const DEFAULT_TOTAL_CAPACITY: usize = 1024;

/// Sizing parameters of a [`BufferPool`](crate::BufferPool).
///
/// `total_capacity` is split evenly across shards with floor division; any
/// remainder is dropped and never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Bytes per buffer.
    pub slot_capacity: usize,
    /// Target slot count across all shards.
    pub total_capacity: usize,
    /// Number of shards.
    pub shard_count: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let shards = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            total_capacity: DEFAULT_TOTAL_CAPACITY,
            shard_count: shards.min(DEFAULT_TOTAL_CAPACITY),
        }
    }
}

impl PoolConfig {
    /// Creates a configuration from explicit values.
    #[must_use]
    pub const fn new(slot_capacity: usize, total_capacity: usize, shard_count: usize) -> Self {
        Self {
            slot_capacity,
            total_capacity,
            shard_count,
        }
    }

    /// Checks the parameters and that each slab size fits in `usize`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroSlotCapacity`], [`Error::ZeroShardCount`],
    /// [`Error::InsufficientCapacity`] or [`Error::SizeOverflow`].
    pub fn validate(&self) -> Result<()> {
        if self.slot_capacity == 0 {
            return Err(Error::ZeroSlotCapacity);
        }
        if self.shard_count == 0 {
            return Err(Error::ZeroShardCount);
        }
        if self.total_capacity < self.shard_count {
            return Err(Error::InsufficientCapacity {
                total_capacity: self.total_capacity,
                shard_count: self.shard_count,
            });
        }
        self.slab_size().map(drop)
    }

    /// Slots owned by each shard.
    #[must_use]
    pub const fn slots_per_shard(&self) -> usize {
        match self.total_capacity.checked_div(self.shard_count) {
            Some(slots) => slots,
            None => 0,
        }
    }

    /// Bytes in one shard's slab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeOverflow`] if the product overflows `usize`.
    pub fn slab_size(&self) -> Result<usize> {
        let slots = self.slots_per_shard();
        slots
            .checked_mul(self.slot_capacity)
            .ok_or(Error::SizeOverflow {
                slots,
                slot_capacity: self.slot_capacity,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PoolConfig::default();
        assert_eq!(config.slot_capacity, DEFAULT_SLOT_CAPACITY);
        assert!(config.shard_count >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_slots_per_shard_floors() {
        let config = PoolConfig::new(16, 10, 3);
        assert_eq!(config.slots_per_shard(), 3);
        assert_eq!(config.slab_size().unwrap(), 48);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            PoolConfig::new(0, 10, 1).validate(),
            Err(Error::ZeroSlotCapacity)
        ));
        assert!(matches!(
            PoolConfig::new(8, 10, 0).validate(),
            Err(Error::ZeroShardCount)
        ));
        assert!(matches!(
            PoolConfig::new(8, 3, 4).validate(),
            Err(Error::InsufficientCapacity {
                total_capacity: 3,
                shard_count: 4
            })
        ));
    }

    #[test]
    fn test_slab_size_overflow() {
        let config = PoolConfig::new(usize::MAX / 2, 3, 1);
        assert!(matches!(
            config.validate(),
            Err(Error::SizeOverflow {
                slots: 3,
                slot_capacity: _
            })
        ));
    }
}
