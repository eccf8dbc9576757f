//! # ruapc-bytepool
//!
//! A sharded, lock-free pool of fixed-capacity byte buffers, for workloads such
//! as network I/O or serialization scratch space that repeatedly need short-lived
//! buffers of one size. This crate is part of the [ruapc](https://github.com/SF-Zhou/ruapc) project.
//!
//! ## Features
//!
//! - **Pre-allocated Slabs**: Each shard owns one contiguous slab carved into equal slots
//! - **Lock-free Claim/Release**: A single compare-and-swap on a per-slot marker
//! - **No False Sharing**: Every marker sits on its own cache line
//! - **Graceful Saturation**: A full shard falls back to a standalone allocation
//! - **Safe Handles**: Buffers carry their shard and slot and borrow the pool
//! - **Custom Allocators**: Pluggable allocator trait, uninitialized slabs by default
//!
//! ## Example
//!
//! ```rust
//! use ruapc_bytepool::{BufferPool, Release};
//!
//! # fn main() -> ruapc_bytepool::Result<()> {
//! // 64 buffers of 4 KiB split across 4 shards
//! let pool = BufferPool::new(4096, 64, 4)?;
//!
//! let mut buffer = pool.get();
//! assert!(buffer.is_empty());
//! assert_eq!(buffer.capacity(), 4096);
//!
//! buffer.extend_from_slice(b"payload")?;
//! assert_eq!(&buffer[..], b"payload");
//!
//! // Hand the slot back; dropping the buffer would do the same
//! assert_eq!(pool.put(buffer), Release::Released);
//! # Ok(())
//! # }
//! ```
//!
//! ## Sharing Across Threads
//!
//! ```rust
//! use std::sync::Arc;
//! use ruapc_bytepool::BufferPool;
//!
//! # fn main() -> ruapc_bytepool::Result<()> {
//! let pool = Arc::new(BufferPool::new(256, 32, 2)?);
//!
//! let workers: Vec<_> = (0..4u8)
//!     .map(|id| {
//!         let pool = Arc::clone(&pool);
//!         std::thread::spawn(move || {
//!             let mut buffer = pool.get();
//!             buffer.push(id).unwrap();
//!             pool.put(buffer);
//!         })
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! assert_eq!(pool.occupied_slots(), 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]

mod allocator;
mod buffer;
mod config;
mod error;
mod pool;
mod selector;
mod shard;
mod stats;

pub use allocator::{Allocator, DefaultAllocator, SLAB_ALIGNMENT, ZeroedAllocator};
pub use buffer::Buffer;
pub use config::{DEFAULT_SLOT_CAPACITY, DEFAULT_TOTAL_CAPACITY, PoolConfig};
pub use error::{Error, Result};
pub use pool::{BufferPool, BufferPoolBuilder, Release};
pub use selector::{RandomSelector, ShardSelector};
pub use stats::PoolStats;
