//! Memory realms: an allocator paired with a bounds checker
//!
//! A realm inflates every request by two canaries and asks the allocator to
//! align the pointer *after* the front canary:
//!
//! ```text
//! raw                user                      user + bytes
//! |[front canary]|[bytes.....................]|[back canary]|
//!  ↑ alloc(bytes + 2 * C, alignment, offset = C)
//! ```
//!
//! Neither the allocator nor the checker knows about the other; any allocator
//! gains overrun detection by composition.

use core::ptr::NonNull;

use tracing::trace;

use crate::allocator::Allocator;
use crate::bounds::{BoundsChecker, NoBoundsChecker, SimpleBoundsChecker};
use crate::error::{AllocError, AllocResult};

/// Allocator wrapped with canaries around every allocation
///
/// # Examples
///
/// ```
/// use memrealm::allocator::StackAllocator;
/// use memrealm::realm::CheckedRealm;
///
/// let mut realm = CheckedRealm::new(StackAllocator::new(4096).unwrap());
/// let ptr = realm.alloc(64, 16).unwrap();
/// unsafe {
///     ptr.as_ptr().write_bytes(0, 64);
///     realm.dealloc(ptr);
/// }
/// ```
#[derive(Debug)]
pub struct MemoryRealm<A, B = SimpleBoundsChecker> {
    allocator: A,
    bounds: B,
}

/// Realm with canary checking
pub type CheckedRealm<A> = MemoryRealm<A, SimpleBoundsChecker>;

/// Realm without canaries, for builds where the checks are not wanted
pub type RetailRealm<A> = MemoryRealm<A, NoBoundsChecker>;

impl<A: Allocator, B: BoundsChecker + Default> MemoryRealm<A, B> {
    /// Wraps `allocator` with a default bounds checker.
    pub fn new(allocator: A) -> Self {
        Self::with_bounds_checker(allocator, B::default())
    }
}

impl<A: Allocator, B: BoundsChecker> MemoryRealm<A, B> {
    /// Wraps `allocator` with the given bounds checker.
    pub fn with_bounds_checker(allocator: A, bounds: B) -> Self {
        Self { allocator, bounds }
    }

    /// Allocates `bytes` bytes aligned to `alignment`, framed by canaries.
    ///
    /// # Errors
    ///
    /// `SizeOverflow` if the inflated request overflows, otherwise whatever
    /// the allocator returns.
    pub fn alloc(&mut self, bytes: usize, alignment: usize) -> AllocResult<NonNull<u8>> {
        let overhead = 2 * B::CANARY_SIZE;
        let total = bytes
            .checked_add(overhead)
            .ok_or(AllocError::SizeOverflow {
                size: bytes,
                overhead,
            })?;

        let raw = self.allocator.alloc(total, alignment, B::CANARY_SIZE)?;
        // SAFETY: `raw` points to `total` writable bytes, so both canaries
        // and the user range fit inside it.
        unsafe {
            let user = raw.add(B::CANARY_SIZE);
            self.bounds.write_canary(raw);
            self.bounds.write_canary(user.add(bytes));
            trace!(bytes, alignment, "realm alloc");
            Ok(user)
        }
    }

    /// Checks both canaries of a live allocation without freeing it.
    ///
    /// # Panics
    ///
    /// If either canary was overwritten.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this realm.
    #[track_caller]
    pub unsafe fn validate(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller's contract.
        let _ = unsafe { self.checked_raw(ptr) };
    }

    /// Validates the canaries and releases the allocation.
    ///
    /// # Panics
    ///
    /// If either canary was overwritten.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this realm.
    #[track_caller]
    pub unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller's contract.
        unsafe {
            let raw = self.checked_raw(ptr);
            self.allocator.dealloc(raw);
        }
        trace!("realm dealloc");
    }

    /// Releases every allocation.
    pub fn reset(&mut self) {
        self.allocator.reset();
    }

    /// Size requested from [`alloc`](Self::alloc) for the allocation at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this realm.
    pub unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        // SAFETY: forwarded from the caller's contract; the allocator saw the
        // raw pointer, one canary below `ptr`.
        unsafe { self.allocator.allocation_size(ptr.sub(B::CANARY_SIZE)) - 2 * B::CANARY_SIZE }
    }

    /// The wrapped allocator
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The bounds checker
    pub fn bounds_checker(&self) -> &B {
        &self.bounds
    }

    /// Unwraps the allocator, dropping the checker.
    pub fn into_inner(self) -> A {
        self.allocator
    }

    /// Validates both canaries and returns the raw allocator pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this realm.
    #[track_caller]
    unsafe fn checked_raw(&self, ptr: NonNull<u8>) -> NonNull<u8> {
        // SAFETY: a live realm allocation starts one canary below `ptr` and
        // spans the size the allocator recorded for it, back canary included.
        unsafe {
            let raw = ptr.sub(B::CANARY_SIZE);
            self.bounds.validate_front_canary(raw);
            let total = self.allocator.allocation_size(raw);
            self.bounds.validate_back_canary(raw.add(total - B::CANARY_SIZE));
            raw
        }
    }
}

/// Object-safe view of a realm, for code that holds realms of different types
pub trait Realm {
    /// See [`MemoryRealm::alloc`].
    ///
    /// # Errors
    ///
    /// See [`MemoryRealm::alloc`].
    fn alloc(&mut self, bytes: usize, alignment: usize) -> AllocResult<NonNull<u8>>;

    /// See [`MemoryRealm::dealloc`].
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this realm.
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>);

    /// See [`MemoryRealm::reset`].
    fn reset(&mut self);
}

impl<A: Allocator, B: BoundsChecker> Realm for MemoryRealm<A, B> {
    fn alloc(&mut self, bytes: usize, alignment: usize) -> AllocResult<NonNull<u8>> {
        Self::alloc(self, bytes, alignment)
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        // SAFETY: same contract.
        unsafe { Self::dealloc(self, ptr) }
    }

    fn reset(&mut self) {
        Self::reset(self);
    }
}
