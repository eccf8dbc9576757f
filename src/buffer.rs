//! Fixed-capacity byte buffer handed out by the pool.
//!
//! This module provides the [`Buffer`] type. A buffer is either a view of one
//! slot in a shard's slab, tagged with the shard and slot index it came from,
//! or a standalone heap allocation made when a shard was saturated. Either way
//! its capacity is fixed for its whole life: writes never reallocate.

use std::io;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::error::{Error, Result};
use crate::shard::Shard;

/// Where a buffer's memory came from.
enum Origin<'a> {
    /// Slot `index` of `shard`'s slab.
    Slot { shard: &'a Shard, index: usize },
    /// A heap allocation owned by the buffer. Its own length is unused.
    Heap(Vec<u8>),
}

/// A byte buffer with a fixed capacity, obtained from
/// [`BufferPool::get`](crate::BufferPool::get).
///
/// A new buffer always has length 0. Bytes are appended with
/// [`push`](Self::push), [`extend_from_slice`](Self::extend_from_slice) or
/// [`std::io::Write`], and only written bytes are ever visible through
/// [`as_slice`](Self::as_slice).
///
/// Slot-backed buffers borrow the pool. Hand them back with
/// [`BufferPool::put`](crate::BufferPool::put); dropping one releases its slot
/// as well.
///
/// # Example
///
/// ```rust
/// use ruapc_bytepool::BufferPool;
///
/// # fn main() -> ruapc_bytepool::Result<()> {
/// let pool = BufferPool::new(1024, 16, 2)?;
/// let mut buffer = pool.get();
/// assert!(buffer.is_empty());
/// assert_eq!(buffer.capacity(), 1024);
///
/// buffer.extend_from_slice(b"hello")?;
/// assert_eq!(&buffer[..], b"hello");
///
/// pool.put(buffer);
/// # Ok(())
/// # }
/// ```
pub struct Buffer<'a> {
    /// Start of the buffer's memory.
    ptr: NonNull<u8>,

    /// Number of initialized bytes.
    len: usize,

    /// Fixed capacity in bytes.
    capacity: usize,

    /// Slot tag or owned allocation.
    origin: Origin<'a>,
}

// SAFETY: a slot-backed buffer is the sole holder of its slot (the marker CAS
// guarantees exclusivity) and `Shard` is `Sync`; a heap buffer owns its Vec.
unsafe impl Send for Buffer<'_> {}

// SAFETY: shared access only reads the initialized prefix.
unsafe impl Sync for Buffer<'_> {}

impl<'a> Buffer<'a> {
    /// Creates a view of a claimed slot.
    ///
    /// The caller must have claimed `index` on `shard`; the slot is released
    /// when the buffer is dropped.
    pub(crate) fn from_slot(shard: &'a Shard, index: usize, capacity: usize) -> Self {
        Self {
            ptr: shard.slot_ptr(index),
            len: 0,
            capacity,
            origin: Origin::Slot { shard, index },
        }
    }

    /// Allocates a standalone buffer outside any slab.
    pub(crate) fn fallback(capacity: usize) -> Self {
        let mut vec = Vec::with_capacity(capacity);
        Self {
            ptr: NonNull::new(vec.as_mut_ptr()).unwrap_or(NonNull::dangling()),
            len: 0,
            capacity,
            origin: Origin::Heap(vec),
        }
    }

    /// The shard and slot this buffer occupies, if it is slot-backed.
    pub(crate) fn slot(&self) -> Option<(&'a Shard, usize)> {
        match self.origin {
            Origin::Slot { shard, index } => Some((shard, index)),
            Origin::Heap(_) => None,
        }
    }

    /// Consumes a slot-backed buffer without releasing its slot.
    ///
    /// Heap buffers are handed back unchanged.
    pub(crate) fn detach_slot(self) -> std::result::Result<(&'a Shard, usize), Self> {
        if let Origin::Slot { shard, index } = self.origin {
            // Nothing else to free: the slab belongs to the shard.
            std::mem::forget(self);
            return Ok((shard, index));
        }
        Err(self)
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the fixed capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many more bytes fit.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity - self.len
    }

    /// Returns `true` if the buffer lives in a pool slab rather than being a
    /// standalone allocation.
    #[inline]
    #[must_use]
    pub const fn is_pooled(&self) -> bool {
        matches!(self.origin, Origin::Slot { .. })
    }

    /// Returns a raw pointer to the buffer's memory.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Returns a mutable raw pointer to the buffer's memory.
    #[inline]
    #[must_use]
    pub const fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        // SAFETY: the first len bytes have been written
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the written bytes mutably.
    #[inline]
    #[must_use]
    pub const fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the first len bytes have been written and we have exclusive access
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the unwritten tail of the buffer, for reading into.
    ///
    /// Mark bytes written there as initialized with [`set_len`](Self::set_len).
    #[inline]
    pub fn spare_capacity_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        // SAFETY: [len, capacity) lies inside the allocation; MaybeUninit
        // makes no claim about its contents
        unsafe {
            std::slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(self.len).cast::<MaybeUninit<u8>>(),
                self.remaining(),
            )
        }
    }

    /// Sets the length of the buffer.
    ///
    /// # Safety
    ///
    /// `len` must not exceed [`capacity`](Self::capacity), and the first `len`
    /// bytes must have been initialized.
    #[inline]
    pub unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.capacity);
        self.len = len;
    }

    /// Appends one byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.extend_from_slice(std::slice::from_ref(&byte))
    }

    /// Appends all of `data`, or nothing if it does not fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if `data` does not fit in the
    /// remaining capacity. The buffer is unchanged in that case.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        let requested = self.len.saturating_add(data.len());
        if requested > self.capacity {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
                requested,
            });
        }
        // SAFETY: len + data.len() <= capacity, and `data` cannot alias the
        // buffer while we hold it mutably
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(self.len), data.len());
        }
        self.len = requested;
        Ok(())
    }

    /// Shortens the buffer to `len` bytes. No-op if it is already shorter.
    #[inline]
    pub const fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Resets the length to 0. Capacity is unchanged.
    #[inline]
    pub const fn clear(&mut self) {
        self.len = 0;
    }

    /// Copies the written bytes into a new `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Converts into a `Vec` holding the written bytes.
    ///
    /// Heap buffers hand over their allocation; slot-backed buffers copy and
    /// release their slot.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        if let Origin::Heap(vec) = &mut self.origin {
            let mut vec = std::mem::take(vec);
            // SAFETY: len <= capacity <= vec.capacity() and the first len
            // bytes were written through this buffer
            unsafe { vec.set_len(self.len) };
            return vec;
        }
        self.to_vec()
    }
}

impl Drop for Buffer<'_> {
    fn drop(&mut self) {
        if let Origin::Slot { shard, index } = self.origin {
            shard.release(index);
        }
    }
}

impl From<Vec<u8>> for Buffer<'_> {
    /// Wraps an existing allocation. Its capacity becomes the buffer's fixed
    /// capacity; the result is never slot-backed.
    fn from(mut vec: Vec<u8>) -> Self {
        Self {
            ptr: NonNull::new(vec.as_mut_ptr()).unwrap_or(NonNull::dangling()),
            len: vec.len(),
            capacity: vec.capacity(),
            origin: Origin::Heap(vec),
        }
    }
}

impl io::Write for Buffer<'_> {
    /// Writes as many bytes as fit; returns `Ok(0)` once full.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        // SAFETY: n <= remaining, so the copy stays within capacity
        unsafe {
            ptr::copy_nonoverlapping(buf.as_ptr(), self.ptr.as_ptr().add(self.len), n);
        }
        self.len += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Deref for Buffer<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for Buffer<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for Buffer<'_> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for Buffer<'_> {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for Buffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Buffer");
        s.field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("capacity", &self.capacity);
        if let Origin::Slot { shard, index } = self.origin {
            s.field("shard", &shard.id()).field("slot", &index);
        }
        s.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::BufferPool;

    #[test]
    fn test_buffer_basic_operations() {
        let pool = BufferPool::new(16, 4, 1).unwrap();
        let mut buffer = pool.get();

        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.remaining(), 16);
        assert!(buffer.is_pooled());

        buffer.push(0xAB).unwrap();
        buffer.extend_from_slice(&[0xCD, 0xEF]).unwrap();
        assert_eq!(buffer.as_slice(), &[0xAB, 0xCD, 0xEF]);
        assert_eq!(buffer.remaining(), 13);

        buffer[1] = 0x01;
        assert_eq!(buffer[1], 0x01);
        buffer.as_mut_slice()[2] = 0x02;
        assert_eq!(&buffer[..], &[0xAB, 0x01, 0x02]);

        buffer.truncate(1);
        assert_eq!(buffer.len(), 1);
        buffer.truncate(5);
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_buffer_capacity_exceeded() {
        let pool = BufferPool::new(4, 1, 1).unwrap();
        let mut buffer = pool.get();

        buffer.extend_from_slice(b"abc").unwrap();
        let err = buffer.extend_from_slice(b"de").unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                capacity: 4,
                requested: 5
            }
        ));
        // Failed write leaves contents untouched
        assert_eq!(&buffer[..], b"abc");

        buffer.push(b'd').unwrap();
        assert!(buffer.push(b'e').is_err());
        assert_eq!(&buffer[..], b"abcd");
    }

    #[test]
    fn test_buffer_io_write() {
        let pool = BufferPool::new(8, 1, 1).unwrap();
        let mut buffer = pool.get();

        assert_eq!(buffer.write(b"12345").unwrap(), 5);
        assert_eq!(buffer.write(b"6789").unwrap(), 3);
        assert_eq!(buffer.write(b"0").unwrap(), 0);
        assert_eq!(&buffer[..], b"12345678");

        buffer.clear();
        let err = buffer.write_all(&[0u8; 9]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_buffer_spare_capacity() {
        let pool = BufferPool::new(8, 1, 1).unwrap();
        let mut buffer = pool.get();
        buffer.push(1).unwrap();

        let spare = buffer.spare_capacity_mut();
        assert_eq!(spare.len(), 7);
        spare[0].write(2);
        spare[1].write(3);
        unsafe { buffer.set_len(3) };
        assert_eq!(&buffer[..], &[1, 2, 3]);
    }

    #[test]
    fn test_fallback_buffer() {
        let mut buffer = Buffer::fallback(32);
        assert!(!buffer.is_pooled());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 32);
        assert!(buffer.slot().is_none());

        buffer.extend_from_slice(&[7; 32]).unwrap();
        assert!(buffer.push(0).is_err());
        assert_eq!(buffer.into_vec(), vec![7; 32]);
    }

    #[test]
    fn test_from_vec() {
        let mut vec = Vec::with_capacity(10);
        vec.extend_from_slice(b"xy");
        let cap = vec.capacity();

        let mut buffer = Buffer::from(vec);
        assert!(!buffer.is_pooled());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.capacity(), cap);
        buffer.push(b'z').unwrap();
        assert_eq!(buffer.into_vec(), b"xyz");
    }

    #[test]
    fn test_into_vec_releases_slot() {
        let pool = BufferPool::new(8, 1, 1).unwrap();
        let mut buffer = pool.get();
        buffer.extend_from_slice(b"data").unwrap();
        assert_eq!(pool.occupied_slots(), 1);

        assert_eq!(buffer.into_vec(), b"data");
        assert_eq!(pool.occupied_slots(), 0);
    }

    #[test]
    fn test_drop_releases_slot() {
        let pool = BufferPool::new(8, 2, 1).unwrap();
        {
            let _a = pool.get();
            let _b = pool.get();
            assert_eq!(pool.occupied_slots(), 2);
        }
        assert_eq!(pool.occupied_slots(), 0);
    }

    #[test]
    fn test_buffer_debug() {
        let pool = BufferPool::new(8, 1, 1).unwrap();
        let buffer = pool.get();

        let debug_str = format!("{buffer:?}");
        assert!(debug_str.contains("Buffer"));
        assert!(debug_str.contains("capacity: 8"));
        assert!(debug_str.contains("slot"));
    }
}
