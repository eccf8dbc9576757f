//! Sharded buffer pool.
//!
//! This module provides the [`BufferPool`] and [`BufferPoolBuilder`] types.
//! The pool splits its slots across a fixed set of shards. `get` routes to a
//! randomly chosen shard and scans it once for a free slot, falling back to a
//! standalone allocation when the shard is full. `put` checks that the buffer
//! belongs to this pool and frees its slot. Neither operation blocks.

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::allocator::{Allocator, DefaultAllocator};
use crate::buffer::Buffer;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::selector::{RandomSelector, ShardSelector};
use crate::shard::Shard;
use crate::stats::PoolStats;

/// Outcome of [`BufferPool::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The buffer's slot was freed.
    Released,
    /// The buffer does not belong to this pool (fallback allocation, other
    /// pool, or mismatched capacity). Nothing changed.
    Foreign,
    /// The buffer's slot was already free. Indicates caller misuse; the
    /// marker is left free.
    Misuse,
}

/// Builder for creating a [`BufferPool`] with custom configuration.
///
/// # Example
///
/// ```rust
/// use ruapc_bytepool::{BufferPoolBuilder, ZeroedAllocator};
///
/// # fn main() -> ruapc_bytepool::Result<()> {
/// let pool = BufferPoolBuilder::new()
///     .slot_capacity(8 * 1024)
///     .total_capacity(256)
///     .shard_count(4)
///     .allocator(ZeroedAllocator::new())
///     .build()?;
/// assert_eq!(pool.slots_per_shard(), 64);
/// # Ok(())
/// # }
/// ```
pub struct BufferPoolBuilder {
    config: PoolConfig,
    allocator: Arc<dyn Allocator>,
    selector: Box<dyn ShardSelector>,
}

impl Default for BufferPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPoolBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - Sizing: [`PoolConfig::default`]
    /// - Allocator: [`DefaultAllocator`]
    /// - Selector: [`RandomSelector`]
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(PoolConfig::default())
    }

    /// Creates a builder starting from `config`.
    #[must_use]
    pub fn from_config(config: PoolConfig) -> Self {
        Self {
            config,
            allocator: Arc::new(DefaultAllocator::new()),
            selector: Box::new(RandomSelector::new()),
        }
    }

    /// Sets the capacity of every buffer, in bytes.
    #[must_use]
    pub const fn slot_capacity(mut self, slot_capacity: usize) -> Self {
        self.config.slot_capacity = slot_capacity;
        self
    }

    /// Sets the target number of slots across all shards.
    ///
    /// Each shard gets `total_capacity / shard_count` slots; the remainder
    /// is not allocated.
    #[must_use]
    pub const fn total_capacity(mut self, total_capacity: usize) -> Self {
        self.config.total_capacity = total_capacity;
        self
    }

    /// Sets the number of shards.
    #[must_use]
    pub const fn shard_count(mut self, shard_count: usize) -> Self {
        self.config.shard_count = shard_count;
        self
    }

    /// Sets the allocator used for the slabs.
    #[must_use]
    pub fn allocator(mut self, allocator: impl Allocator + 'static) -> Self {
        self.allocator = Arc::new(allocator);
        self
    }

    /// Sets the strategy that picks a shard for each `get`.
    #[must_use]
    pub fn selector(mut self, selector: impl ShardSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Allocates every shard's slab and builds the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a slab size
    /// overflows, or the allocator fails.
    pub fn build(self) -> Result<BufferPool> {
        let config = self.config;
        config.validate()?;

        let slots = config.slots_per_shard();
        let shards = (0..config.shard_count)
            .map(|id| Shard::new(id, config.slot_capacity, slots, Arc::clone(&self.allocator)))
            .collect::<Result<Box<[_]>>>()?;

        debug!(
            shards = config.shard_count,
            slots_per_shard = slots,
            slot_capacity = config.slot_capacity,
            slab_bytes = slots * config.slot_capacity,
            dropped_slots = config.total_capacity % config.shard_count,
            "buffer pool constructed"
        );

        Ok(BufferPool {
            config,
            shards,
            selector: self.selector,
            fallbacks: AtomicU64::new(0),
            misuses: AtomicU64::new(0),
        })
    }
}

/// A lock-free pool of fixed-capacity byte buffers.
///
/// Every slab is allocated up front and lives as long as the pool. Buffers
/// borrow the pool, so it cannot be dropped while any are outstanding.
///
/// # Thread Safety
///
/// `BufferPool` is `Send + Sync`; share it by reference or through an `Arc`.
/// Claims and releases are single atomic compare-and-swaps on per-slot
/// markers.
///
/// # Example
///
/// ```rust
/// use ruapc_bytepool::{BufferPool, Release};
///
/// # fn main() -> ruapc_bytepool::Result<()> {
/// let pool = BufferPool::new(1024, 10, 1)?;
///
/// let mut buffer = pool.get();
/// buffer.push(1)?;
/// assert_eq!(pool.put(buffer), Release::Released);
/// assert_eq!(pool.occupied_slots(), 0);
/// # Ok(())
/// # }
/// ```
pub struct BufferPool {
    config: PoolConfig,
    shards: Box<[Shard]>,
    selector: Box<dyn ShardSelector>,
    fallbacks: AtomicU64,
    misuses: AtomicU64,
}

impl BufferPool {
    /// Creates a pool of `total_capacity` buffers of `slot_capacity` bytes
    /// split across `shard_count` shards.
    ///
    /// # Errors
    ///
    /// Returns an error on zero capacity or shard count, on
    /// `total_capacity < shard_count`, on slab size overflow, or if a slab
    /// cannot be allocated.
    pub fn new(slot_capacity: usize, total_capacity: usize, shard_count: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(slot_capacity, total_capacity, shard_count))
    }

    /// Creates a pool from `config` with the default allocator and selector.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        BufferPoolBuilder::from_config(config).build()
    }

    /// Returns a builder with default settings.
    #[must_use]
    pub fn builder() -> BufferPoolBuilder {
        BufferPoolBuilder::new()
    }

    /// Takes a buffer with length 0 and capacity [`slot_capacity`](Self::slot_capacity).
    ///
    /// Scans one randomly chosen shard once. If every slot there is taken, a
    /// standalone buffer is allocated instead; it is fully usable but `put`
    /// ignores it.
    pub fn get(&self) -> Buffer<'_> {
        let count = self.shards.len();
        let shard = &self.shards[self.selector.select(count) % count];

        if let Some(index) = shard.claim() {
            return Buffer::from_slot(shard, index, self.config.slot_capacity);
        }

        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        trace!(shard = shard.id(), "shard saturated, allocating fallback buffer");
        Buffer::fallback(self.config.slot_capacity)
    }

    /// Returns a buffer to the pool.
    ///
    /// Buffers that did not come from this pool's slabs are dropped without
    /// touching this pool. A slot-backed buffer from another pool goes back
    /// to that pool.
    pub fn put(&self, buffer: Buffer<'_>) -> Release {
        if buffer.capacity() != self.config.slot_capacity {
            trace!(
                capacity = buffer.capacity(),
                expected = self.config.slot_capacity,
                "ignoring buffer with foreign capacity"
            );
            return Release::Foreign;
        }

        let addr = buffer.as_ptr();
        let Ok((shard, index)) = buffer.detach_slot() else {
            trace!("ignoring fallback buffer");
            return Release::Foreign;
        };

        let owned = self
            .shards
            .get(shard.id())
            .is_some_and(|own| ptr::eq(own, shard));
        if !owned {
            trace!("returning buffer of another pool to its owner");
            shard.release(index);
            return Release::Foreign;
        }

        debug_assert_eq!(shard.slot_index(addr), Some(index));
        if shard.release(index) {
            Release::Released
        } else {
            self.misuses.fetch_add(1, Ordering::Relaxed);
            warn!(shard = shard.id(), slot = index, "released a slot that was not claimed");
            Release::Misuse
        }
    }

    /// Whether `buffer`'s memory lies in one of this pool's slabs.
    #[must_use]
    pub fn owns(&self, buffer: &Buffer<'_>) -> bool {
        let addr = buffer.as_ptr();
        self.shards.iter().any(|shard| shard.contains(addr))
    }

    /// Capacity of every buffer, in bytes.
    #[must_use]
    pub const fn slot_capacity(&self) -> usize {
        self.config.slot_capacity
    }

    /// Target slot count the pool was configured with.
    #[must_use]
    pub const fn total_capacity(&self) -> usize {
        self.config.total_capacity
    }

    /// Number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Slots owned by each shard.
    #[must_use]
    pub const fn slots_per_shard(&self) -> usize {
        self.config.slots_per_shard()
    }

    /// Slots currently claimed across all shards.
    #[must_use]
    pub fn occupied_slots(&self) -> usize {
        self.shards.iter().map(Shard::occupied).sum()
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            slot_capacity: self.config.slot_capacity,
            shard_count: self.shards.len(),
            slots_per_shard: self.slots_per_shard(),
            occupied_slots: self.occupied_slots(),
            fallback_allocations: self.fallbacks.load(Ordering::Relaxed),
            misuse_releases: self.misuses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("shards", &self.shards)
            .finish_non_exhaustive()
    }
}
