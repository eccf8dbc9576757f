//! Error types for pool construction and buffer writes.

use thiserror::Error;

/// Errors produced by the buffer pool.
///
/// Construction errors are configuration mistakes and are not recoverable at
/// runtime. `get` and `put` never fail.
#[derive(Debug, Error)]
pub enum Error {
    /// The per-buffer capacity was zero.
    #[error("slot capacity must be greater than zero")]
    ZeroSlotCapacity,

    /// The shard count was zero.
    #[error("shard count must be greater than zero")]
    ZeroShardCount,

    /// Fewer slots were requested than there are shards, leaving empty shards.
    #[error("total capacity {total_capacity} is smaller than shard count {shard_count}")]
    InsufficientCapacity {
        /// Requested slot count across all shards.
        total_capacity: usize,
        /// Requested shard count.
        shard_count: usize,
    },

    /// `slots * slot_capacity` does not fit in the address space.
    #[error("slab size overflows: {slots} slots of {slot_capacity} bytes")]
    SizeOverflow {
        /// Slots per shard.
        slots: usize,
        /// Bytes per slot.
        slot_capacity: usize,
    },

    /// The allocator failed to provide a slab.
    #[error("slab allocation failed: {0}")]
    Allocation(#[from] std::io::Error),

    /// A write would grow a buffer past its fixed capacity.
    #[error("buffer capacity exceeded: capacity {capacity}, requested {requested}")]
    CapacityExceeded {
        /// Fixed capacity of the buffer.
        capacity: usize,
        /// Length the write would have produced.
        requested: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
