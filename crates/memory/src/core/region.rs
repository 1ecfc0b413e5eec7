//! Raw memory regions and typed views into them
//!
//! # Safety
//!
//! [`RawRegion`] is the one place where allocator bookkeeping turns into raw
//! memory access. Its constructor is `unsafe` and carries the whole contract:
//! once a region exists, every read and write through it is bounds-checked
//! against `len` and restricted to [`Pod`] types, so callers work with
//! validated offsets instead of reinterpreting pointers themselves.
//!
//! ## Invariants
//!
//! - `[begin, begin + len)` is readable, writable and initialized for as long
//!   as the region (or any copy of it) is used
//! - `begin + len` does not wrap the address space
//! - reads and writes are unaligned, so headers may sit at any offset

use core::fmt;
use core::mem::size_of;
use core::ptr::NonNull;

use bytemuck::Pod;
use memrealm_system::VirtualRegion;

use crate::error::{AllocError, AllocResult};

/// A `[begin, begin + len)` byte range with typed, bounds-checked access
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawRegion {
    begin: NonNull<u8>,
    len: usize,
}

impl RawRegion {
    /// Creates a view over `[begin, begin + len)`.
    ///
    /// # Safety
    ///
    /// - the range must be valid for reads and writes, and initialized, for
    ///   as long as the returned view or any copy of it is used
    /// - `begin + len` must not overflow
    #[inline]
    pub const unsafe fn from_raw_parts(begin: NonNull<u8>, len: usize) -> Self {
        Self { begin, len }
    }

    /// First byte of the region
    #[inline]
    pub fn begin(&self) -> NonNull<u8> {
        self.begin
    }

    /// Address of the first byte
    #[inline]
    pub fn begin_addr(&self) -> usize {
        self.begin.as_ptr() as usize
    }

    /// Address one past the last byte
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.begin_addr() + self.len
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length region
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if `ptr` points at a byte inside the region
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        matches!(self.offset_of(ptr), Some(offset) if offset < self.len)
    }

    /// Offset of `ptr` from the region start, if `begin <= ptr <= end`.
    ///
    /// The end address itself is accepted so that zero-sized allocations at
    /// the very end of a block can be located.
    #[inline]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = (ptr as usize).checked_sub(self.begin_addr())?;
        (offset <= self.len).then_some(offset)
    }

    /// Pointer to the byte at `offset` (`offset == len` yields the end pointer)
    #[inline]
    #[track_caller]
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(
            offset <= self.len,
            "region offset {offset} out of bounds ({} bytes)",
            self.len
        );
        // SAFETY: `offset <= len`, so the result stays inside the region or one
        // past its end, which is within the same allocation.
        unsafe { self.begin.add(offset) }
    }

    /// Reads a `T` stored at `offset`
    #[inline]
    #[track_caller]
    pub fn read_at<T: Pod>(&self, offset: usize) -> T {
        self.check_span(offset, size_of::<T>());
        // SAFETY: the span is in bounds and initialized (region invariant) and
        // any bit pattern is a valid `T` because `T: Pod`.
        unsafe { self.begin.add(offset).cast::<T>().read_unaligned() }
    }

    /// Writes `value` at `offset`
    #[inline]
    #[track_caller]
    pub fn write_at<T: Pod>(&self, offset: usize, value: T) {
        self.check_span(offset, size_of::<T>());
        // SAFETY: the span is in bounds and writable (region invariant).
        unsafe { self.begin.add(offset).cast::<T>().write_unaligned(value) }
    }

    /// Fills `len` bytes starting at `offset` with `byte`
    #[inline]
    #[track_caller]
    pub fn fill(&self, offset: usize, len: usize, byte: u8) {
        self.check_span(offset, len);
        // SAFETY: the span is in bounds and writable (region invariant).
        unsafe { self.begin.add(offset).write_bytes(byte, len) }
    }

    #[inline]
    #[track_caller]
    fn check_span(&self, offset: usize, len: usize) {
        let in_bounds = offset.checked_add(len).is_some_and(|end| end <= self.len);
        assert!(
            in_bounds,
            "region access of {len} bytes at offset {offset} out of bounds ({} bytes)",
            self.len
        );
    }
}

impl fmt::Debug for RawRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRegion")
            .field("begin", &format_args!("{:#x}", self.begin_addr()))
            .field("len", &self.len)
            .finish()
    }
}

/// Who releases a block's memory
#[derive(Debug)]
pub enum Ownership {
    /// Reserved by the allocator and released when it is dropped
    Owned(VirtualRegion),
    /// Supplied by the caller, who keeps ownership
    Borrowed,
}

/// Backing memory of a fixed-capacity allocator
#[derive(Debug)]
pub struct MemoryBlock {
    region: RawRegion,
    ownership: Ownership,
}

// SAFETY: a block is the only handle to its memory (owned, or borrowed under
// the exclusivity contract of `borrowed`), so moving it to another thread
// moves all access with it.
unsafe impl Send for MemoryBlock {}

impl MemoryBlock {
    /// Reserves and commits `capacity` bytes of fresh, zeroed memory.
    ///
    /// The reservation is rounded up to the page size, but the block only
    /// exposes the requested `capacity`.
    pub fn reserve(capacity: usize) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::invalid_config("capacity cannot be zero"));
        }

        let memory = VirtualRegion::reserve_committed(capacity)?;
        // SAFETY: the first `capacity` bytes are committed read/write and zeroed
        // by the OS, and they stay mapped as long as `memory`, which the block
        // keeps alive next to the view.
        let region = unsafe { RawRegion::from_raw_parts(memory.base(), capacity) };

        Ok(Self {
            region,
            ownership: Ownership::Owned(memory),
        })
    }

    /// Wraps caller-supplied memory `[begin, end)`.
    ///
    /// # Safety
    ///
    /// - `[begin, end)` must be valid for reads and writes, and initialized,
    ///   for the whole lifetime of the block
    /// - nothing else may access that memory while the block is alive, other
    ///   than through pointers the allocator hands out
    pub unsafe fn borrowed(begin: NonNull<u8>, end: NonNull<u8>) -> AllocResult<Self> {
        let len = (end.as_ptr() as usize)
            .checked_sub(begin.as_ptr() as usize)
            .filter(|&len| len > 0)
            .ok_or_else(|| AllocError::invalid_config("memory range is empty or inverted"))?;

        // SAFETY: forwarded from the caller's contract.
        let region = unsafe { RawRegion::from_raw_parts(begin, len) };

        Ok(Self {
            region,
            ownership: Ownership::Borrowed,
        })
    }

    /// View over the usable bytes
    #[inline]
    pub fn region(&self) -> RawRegion {
        self.region
    }

    /// True if dropping the block releases its memory
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Owned(_))
    }

    /// Ownership of the backing memory
    #[inline]
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }
}
