//! Raw slab allocation.
//!
//! This module provides the [`Allocator`] trait the pool uses to obtain the
//! backing storage of each shard, and two implementations:
//! [`DefaultAllocator`], which hands out uninitialized memory, and
//! [`ZeroedAllocator`], which zero-fills it.
//!
//! Uninitialized slabs are safe to hand out because every buffer starts with
//! length 0: no byte is exposed to the caller before it has been written.

use std::alloc::{Layout, alloc, alloc_zeroed, dealloc};
use std::io::{Error, ErrorKind, Result};

/// Alignment of every slab, one cache line.
pub const SLAB_ALIGNMENT: usize = 64;

/// Trait for slab allocation backends.
///
/// The pool calls [`allocate`](Self::allocate) once per shard at construction
/// and [`deallocate`](Self::deallocate) once per shard when the pool is
/// dropped.
///
/// # Safety
///
/// Implementations must ensure:
/// - `allocate` returns a valid pointer to at least `size` bytes, aligned to
///   [`SLAB_ALIGNMENT`]
/// - `deallocate` is only called with pointers previously returned by `allocate`
/// - The allocated memory remains valid until `deallocate` is called
///
/// # Example
///
/// ```rust
/// use ruapc_bytepool::Allocator;
/// use std::io::Result;
///
/// struct MyAllocator;
///
/// impl Allocator for MyAllocator {
///     fn allocate(&self, size: usize) -> Result<*mut u8> {
///         // Custom allocation logic
///         # unimplemented!()
///     }
///
///     unsafe fn deallocate(&self, ptr: *mut u8, size: usize) {
///         // Custom deallocation logic
///         # unimplemented!()
///     }
/// }
/// ```
pub trait Allocator: Send + Sync {
    /// Allocates a slab of `size` bytes. The contents may be uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero, exceeds the platform limit, or the
    /// underlying allocation fails.
    fn allocate(&self, size: usize) -> Result<*mut u8>;

    /// Deallocates a slab previously returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `ptr` was returned by a previous call to `allocate` on this allocator
    /// - `size` matches the size passed to the original `allocate` call
    /// - The memory has not already been deallocated
    unsafe fn deallocate(&self, ptr: *mut u8, size: usize);
}

fn slab_layout(size: usize) -> Result<Layout> {
    if size == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "size must be > 0"));
    }
    Layout::from_size_align(size, SLAB_ALIGNMENT).map_err(|e| Error::new(ErrorKind::InvalidInput, e))
}

fn check_null(ptr: *mut u8) -> Result<*mut u8> {
    if ptr.is_null() {
        Err(Error::new(
            ErrorKind::OutOfMemory,
            "failed to allocate memory",
        ))
    } else {
        Ok(ptr)
    }
}

unsafe fn release(ptr: *mut u8, size: usize) {
    if size == 0 || ptr.is_null() {
        return;
    }
    if let Ok(layout) = Layout::from_size_align(size, SLAB_ALIGNMENT) {
        // SAFETY: ptr was allocated with this layout by one of the allocators below
        unsafe { dealloc(ptr, layout) };
    }
}

/// Allocator returning uninitialized, cache-line aligned slabs.
///
/// Skips the zero-fill cost on construction; this is the pool's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl DefaultAllocator {
    /// Creates a new default allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for DefaultAllocator {
    fn allocate(&self, size: usize) -> Result<*mut u8> {
        let layout = slab_layout(size)?;
        // SAFETY: layout has non-zero size and a power-of-two alignment
        check_null(unsafe { alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: *mut u8, size: usize) {
        // SAFETY: forwarded caller contract
        unsafe { release(ptr, size) };
    }
}

/// Allocator returning zero-filled, cache-line aligned slabs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroedAllocator;

impl ZeroedAllocator {
    /// Creates a new zeroing allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for ZeroedAllocator {
    fn allocate(&self, size: usize) -> Result<*mut u8> {
        let layout = slab_layout(size)?;
        // SAFETY: layout has non-zero size and a power-of-two alignment
        check_null(unsafe { alloc_zeroed(layout) })
    }

    unsafe fn deallocate(&self, ptr: *mut u8, size: usize) {
        // SAFETY: forwarded caller contract
        unsafe { release(ptr, size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocator_basic() {
        let allocator = DefaultAllocator::new();

        let size = 64 * 1024;
        let ptr = allocator.allocate(size).unwrap();
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % SLAB_ALIGNMENT, 0);

        // Write and read back
        unsafe {
            std::ptr::write_bytes(ptr, 0xAB, size);
            assert_eq!(*ptr, 0xAB);
            assert_eq!(*ptr.add(size - 1), 0xAB);
        }

        unsafe {
            allocator.deallocate(ptr, size);
        }
    }

    #[test]
    fn test_default_allocator_zero_size() {
        let allocator = DefaultAllocator::new();
        let err = allocator.allocate(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_default_allocator_oversized() {
        let allocator = DefaultAllocator::new();
        assert!(allocator.allocate(usize::MAX).is_err());
    }

    #[test]
    fn test_zeroed_allocator() {
        let allocator = ZeroedAllocator::new();

        let size = 4096;
        let ptr = allocator.allocate(size).unwrap();
        unsafe {
            let bytes = std::slice::from_raw_parts(ptr, size);
            assert!(bytes.iter().all(|&b| b == 0));
            allocator.deallocate(ptr, size);
        }
    }
}
