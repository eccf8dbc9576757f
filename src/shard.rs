//! Slab-backed shard with lock-free slot claim and release.
//!
//! A shard owns one contiguous slab of `slots * slot_capacity` bytes. Slot `i`
//! covers `[i * slot_capacity, (i + 1) * slot_capacity)`. Occupancy lives in a
//! parallel marker array where each marker sits on its own cache line, so
//! claims on neighbouring slots never contend on the same line.

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::allocator::Allocator;
use crate::error::{Error, Result};

/// One partition of the pool: a slab, its markers and a rotation cursor.
pub(crate) struct Shard {
    /// Position of this shard in the owning pool.
    id: usize,

    /// Base address of the slab.
    slab: NonNull<u8>,

    /// Total slab size in bytes.
    slab_size: usize,

    /// Bytes per slot.
    slot_capacity: usize,

    /// Occupancy per slot: `false` = free, `true` = claimed.
    markers: Box<[CachePadded<AtomicBool>]>,

    /// Last scan start. Only a hint, races are benign.
    cursor: CachePadded<AtomicUsize>,

    /// Allocator the slab came from, used to free it.
    allocator: Arc<dyn Allocator>,
}

// SAFETY: the slab is only written through slots claimed by a successful CAS
// on their marker, so no two threads ever hold the same slot. Everything else
// is atomics or immutable after construction.
unsafe impl Send for Shard {}
unsafe impl Sync for Shard {}

impl Shard {
    /// Allocates a slab of `slots * slot_capacity` bytes with every slot free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeOverflow`] if the slab size overflows, or
    /// [`Error::Allocation`] if the allocator fails.
    pub(crate) fn new(
        id: usize,
        slot_capacity: usize,
        slots: usize,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Self> {
        let slab_size = slots.checked_mul(slot_capacity).ok_or(Error::SizeOverflow {
            slots,
            slot_capacity,
        })?;
        let slab = NonNull::new(allocator.allocate(slab_size)?)
            .ok_or_else(|| Error::Allocation(std::io::Error::other("allocator returned null")))?;

        let markers = (0..slots)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect();

        Ok(Self {
            id,
            slab,
            slab_size,
            slot_capacity,
            markers,
            cursor: CachePadded::new(AtomicUsize::new(0)),
            allocator,
        })
    }

    /// Position of this shard in its pool.
    #[inline]
    pub(crate) const fn id(&self) -> usize {
        self.id
    }

    /// Number of slots in the slab.
    #[inline]
    pub(crate) fn slots(&self) -> usize {
        self.markers.len()
    }

    /// Claims a free slot, scanning once from the next cursor position.
    ///
    /// Returns `None` when every slot was observed claimed during the scan.
    pub(crate) fn claim(&self) -> Option<usize> {
        let slots = self.slots();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % slots;

        (0..slots)
            .map(|offset| (start + offset) % slots)
            .find(|&index| {
                self.markers[index]
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            })
    }

    /// Frees a claimed slot.
    ///
    /// Returns `false` if the slot was not claimed, which means the caller
    /// released something it did not hold.
    pub(crate) fn release(&self, index: usize) -> bool {
        self.markers.get(index).is_some_and(|marker| {
            marker
                .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
                .is_ok()
        })
    }

    /// Start of slot `index`.
    ///
    /// `index` must be less than [`slots`](Self::slots).
    #[inline]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.slots());
        // SAFETY: index < slots, so the offset stays within the slab
        unsafe { self.slab.add(index * self.slot_capacity) }
    }

    /// Whether `addr` lies inside this shard's slab.
    #[inline]
    pub(crate) fn contains(&self, addr: *const u8) -> bool {
        let base = self.slab.as_ptr() as usize;
        let addr = addr as usize;
        addr >= base && addr - base < self.slab_size
    }

    /// Slot containing `addr`, if it lies inside this shard's slab.
    pub(crate) fn slot_index(&self, addr: *const u8) -> Option<usize> {
        self.contains(addr)
            .then(|| (addr as usize - self.slab.as_ptr() as usize) / self.slot_capacity)
    }

    /// Whether slot `index` is currently claimed.
    #[inline]
    pub(crate) fn is_claimed(&self, index: usize) -> bool {
        self.markers
            .get(index)
            .is_some_and(|marker| marker.load(Ordering::Acquire))
    }

    /// Number of claimed slots. Racy snapshot under concurrent use.
    pub(crate) fn occupied(&self) -> usize {
        self.markers
            .iter()
            .filter(|marker| marker.load(Ordering::Relaxed))
            .count()
    }
}

impl Drop for Shard {
    fn drop(&mut self) {
        // SAFETY: the slab was allocated by this allocator with slab_size bytes,
        // and buffers borrow the pool so none can be outstanding here
        unsafe {
            self.allocator.deallocate(self.slab.as_ptr(), self.slab_size);
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("slab", &self.slab)
            .field("slots", &self.slots())
            .field("slot_capacity", &self.slot_capacity)
            .field("occupied", &self.occupied())
            .finish_non_exhaustive()
    }
}
