//! The allocator contract
//!
//! # Safety
//!
//! [`Allocator`] is an `unsafe trait`: implementors promise that every pointer
//! returned by [`Allocator::alloc`]
//! - points to at least `size` writable bytes that no other live allocation
//!   overlaps
//! - satisfies `(ptr + offset) % alignment == 0`
//! - stays valid until it is passed to [`Allocator::dealloc`], the allocator is
//!   [`reset`](Allocator::reset), or the allocator is dropped
//!
//! Callers in turn only hand back pointers that this allocator returned and
//! that are still live.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocResult;

/// Raw allocator with an explicit alignment offset
///
/// `offset` is the distance between the pointer returned here and the pointer
/// an outer layer will finally expose, for layers that prepend their own bytes.
/// The allocator aligns `ptr + offset`, not `ptr`.
///
/// The trait is dyn-compatible, so allocators of different kinds can be driven
/// through `Box<dyn Allocator>`.
///
/// # Examples
///
/// ```
/// use memrealm::allocator::{Allocator, LinearAllocator};
///
/// let mut linear = LinearAllocator::new(4096).unwrap();
/// let ptr = linear.alloc(100, 16, 0).unwrap();
/// assert_eq!(ptr.as_ptr() as usize % 16, 0);
/// assert_eq!(unsafe { linear.allocation_size(ptr) }, 100);
/// ```
pub unsafe trait Allocator {
    /// Allocates `size` bytes such that `ptr + offset` is aligned to
    /// `alignment`.
    ///
    /// An alignment of 0 means "no constraint".
    ///
    /// # Errors
    ///
    /// Returns an error when the allocator cannot fit the request. Alignments
    /// that are not powers of two are misuse and panic.
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>>;

    /// Releases an allocation.
    ///
    /// What "release" means depends on the allocator: a linear allocator only
    /// validates the pointer, a stack rewinds, a pool recycles the slot.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`alloc`](Allocator::alloc) on this allocator and
    /// must not have been released since.
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>);

    /// Releases every allocation at once.
    ///
    /// Pointers obtained before the reset must not be used afterwards.
    fn reset(&mut self);

    /// Size originally requested for the allocation at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator.
    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize;

    /// Allocates for a [`Layout`] with no offset.
    ///
    /// # Errors
    ///
    /// Same as [`alloc`](Allocator::alloc).
    #[inline]
    fn alloc_layout(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        self.alloc(layout.size(), layout.align(), 0)
    }
}

// SAFETY: forwards every call to `A`, which upholds the contract.
unsafe impl<A: Allocator + ?Sized> Allocator for &mut A {
    #[inline]
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        (**self).alloc(size, alignment, offset)
    }

    #[inline]
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        // SAFETY: same contract as `A::dealloc`.
        unsafe { (**self).dealloc(ptr) }
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset();
    }

    #[inline]
    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        // SAFETY: same contract as `A::allocation_size`.
        unsafe { (**self).allocation_size(ptr) }
    }
}

// SAFETY: forwards every call to `A`, which upholds the contract.
unsafe impl<A: Allocator + ?Sized> Allocator for Box<A> {
    #[inline]
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        (**self).alloc(size, alignment, offset)
    }

    #[inline]
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        // SAFETY: same contract as `A::dealloc`.
        unsafe { (**self).dealloc(ptr) }
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset();
    }

    #[inline]
    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        // SAFETY: same contract as `A::allocation_size`.
        unsafe { (**self).allocation_size(ptr) }
    }
}
