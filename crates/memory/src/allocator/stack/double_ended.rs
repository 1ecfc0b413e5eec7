//! Double-ended stack allocator
//!
//! Two LIFO stacks share one block: the front grows up from the start, the
//! back grows down from the end, and allocation fails once they would meet.
//!
//! ```text
//! block start      front                  back              block end
//! |[front allocs...]|........free.........|[...back allocs]|
//! ```
//!
//! Back-end headers sit below their allocation like front-end ones, but record
//! the distance from the block end instead of from the start.

use core::ptr::NonNull;

use tracing::{debug, trace};

use super::StackConfig;
use crate::allocator::header::{StackHeader, ensure_header_capacity, narrow};
use crate::allocator::{Allocator, AllocatorStats, StatisticsProvider, StatsTracker};
use crate::core::{MemoryBlock, MemoryUsage, RawRegion};
use crate::error::{AllocError, AllocResult, Misuse, StackEnd};
use crate::utils::{align_bottom, checked_align_top, normalize_alignment};

/// Two stacks growing toward each other inside one block
///
/// The [`Allocator`] implementation drives the front end; the back end is
/// reached through [`alloc_back`](Self::alloc_back) and
/// [`dealloc_back`](Self::dealloc_back).
#[derive(Debug)]
pub struct DoubleEndedStackAllocator {
    block: MemoryBlock,
    /// First free byte above the front stack
    front: usize,
    /// Lowest byte used by the back stack
    back: usize,
    front_id: u32,
    back_id: u32,
    config: StackConfig,
    stats: StatsTracker,
}

impl DoubleEndedStackAllocator {
    /// Creates a double-ended stack over `capacity` bytes of fresh memory.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero capacity or one above `u32::MAX`, and
    /// `System` if the memory cannot be reserved.
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, StackConfig::default())
    }

    /// Creates a double-ended stack with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_config(capacity: usize, config: StackConfig) -> AllocResult<Self> {
        ensure_header_capacity(capacity)?;
        Ok(Self::from_block(MemoryBlock::reserve(capacity)?, config))
    }

    /// Creates a double-ended stack over caller-owned memory `[begin, end)`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an empty or inverted range, or one larger than
    /// `u32::MAX` bytes.
    ///
    /// # Safety
    ///
    /// The range must be valid for reads and writes, and unused by anything
    /// else, for as long as the allocator is alive.
    pub unsafe fn from_raw_range(begin: NonNull<u8>, end: NonNull<u8>) -> AllocResult<Self> {
        // SAFETY: forwarded from the caller's contract.
        unsafe { Self::from_raw_range_with_config(begin, end, StackConfig::default()) }
    }

    /// [`from_raw_range`](Self::from_raw_range) with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`from_raw_range`](Self::from_raw_range).
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_range`](Self::from_raw_range).
    pub unsafe fn from_raw_range_with_config(
        begin: NonNull<u8>,
        end: NonNull<u8>,
        config: StackConfig,
    ) -> AllocResult<Self> {
        // SAFETY: forwarded from the caller's contract.
        let block = unsafe { MemoryBlock::borrowed(begin, end)? };
        ensure_header_capacity(block.region().len())?;
        Ok(Self::from_block(block, config))
    }

    fn from_block(block: MemoryBlock, config: StackConfig) -> Self {
        let capacity = block.region().len();
        debug!(
            kind = "double_ended_stack",
            capacity,
            owned = block.is_owned(),
            lifo_checks = config.lifo_checks,
            "allocator created"
        );
        Self {
            stats: StatsTracker::new(config.track_stats),
            block,
            front: 0,
            back: capacity,
            front_id: 0,
            back_id: 0,
            config,
        }
    }

    /// Total size of the block
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block.region().len()
    }

    /// Bytes used by the front stack, headers and padding included
    #[inline]
    pub fn front_used(&self) -> usize {
        self.front
    }

    /// Bytes used by the back stack, headers and padding included
    #[inline]
    pub fn back_used(&self) -> usize {
        self.capacity() - self.back
    }

    /// Free bytes between the two stacks
    #[inline]
    pub fn available(&self) -> usize {
        self.back - self.front
    }

    /// Current configuration
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Allocates from the front (low addresses). Same as [`Allocator::alloc`].
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if the allocation would cross into the back stack.
    pub fn alloc_front(
        &mut self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        let region = self.block.region();

        let Some(user) = self.place_front(region, size, alignment, offset) else {
            return Err(self.fail(size, alignment, StackEnd::Front));
        };

        let id = self.front_id.wrapping_add(1);
        region.write_at(
            user - StackHeader::SIZE,
            StackHeader {
                offset: narrow(self.front),
                size: narrow(size),
                id,
            },
        );
        self.fill_alloc(region, user, size);
        self.front = user + size;
        self.front_id = id;
        self.stats.record_alloc(size);

        trace!(size, alignment, offset, user, id, "front alloc");
        Ok(region.ptr_at(user))
    }

    /// Allocates from the back (high addresses).
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if the allocation would cross into the front stack.
    pub fn alloc_back(
        &mut self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        let region = self.block.region();

        let Some(user) = self.place_back(region, size, alignment, offset) else {
            return Err(self.fail(size, alignment, StackEnd::Back));
        };

        let id = self.back_id.wrapping_add(1);
        let header_at = user - StackHeader::SIZE;
        region.write_at(
            header_at,
            StackHeader {
                offset: narrow(region.len() - self.back),
                size: narrow(size),
                id,
            },
        );
        self.fill_alloc(region, user, size);
        self.back = header_at;
        self.back_id = id;
        self.stats.record_alloc(size);

        trace!(size, alignment, offset, user, id, "back alloc");
        Ok(region.ptr_at(user))
    }

    /// Frees the newest front allocation. Same as [`Allocator::dealloc`].
    ///
    /// # Safety
    ///
    /// `ptr` must be a live front allocation of this allocator.
    pub unsafe fn dealloc_front(&mut self, ptr: NonNull<u8>) {
        let user = self.locate(ptr, StackEnd::Front);
        let region = self.block.region();
        let header: StackHeader = region.read_at(user - StackHeader::SIZE);
        self.check_order(header.id, self.front_id);

        let rewind = header.offset as usize;
        if let Some(pattern) = self.config.dealloc_pattern {
            region.fill(rewind, self.front - rewind, pattern);
        }
        self.front = rewind;
        self.front_id = header.id.wrapping_sub(1);
        self.stats.record_dealloc(header.size as usize);

        trace!(user, id = header.id, front = rewind, "front dealloc");
    }

    /// Frees the newest back allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live back allocation of this allocator.
    pub unsafe fn dealloc_back(&mut self, ptr: NonNull<u8>) {
        let user = self.locate(ptr, StackEnd::Back);
        let region = self.block.region();
        let header: StackHeader = region.read_at(user - StackHeader::SIZE);
        self.check_order(header.id, self.back_id);

        let rewind = region.len() - header.offset as usize;
        if let Some(pattern) = self.config.dealloc_pattern {
            region.fill(self.back, rewind - self.back, pattern);
        }
        self.back = rewind;
        self.back_id = header.id.wrapping_sub(1);
        self.stats.record_dealloc(header.size as usize);

        trace!(user, id = header.id, back = rewind, "back dealloc");
    }

    /// Releases the front stack only.
    pub fn reset_front(&mut self) {
        self.front = 0;
        self.front_id = 0;
    }

    /// Releases the back stack only.
    pub fn reset_back(&mut self) {
        self.back = self.capacity();
        self.back_id = 0;
    }

    fn place_front(
        &self,
        region: RawRegion,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<usize> {
        let unaligned = region
            .begin_addr()
            .checked_add(self.front + StackHeader::SIZE)?
            .checked_add(offset)?;
        let user = checked_align_top(unaligned, alignment)? - offset - region.begin_addr();
        let end = user.checked_add(size)?;
        (end <= self.back).then_some(user)
    }

    fn place_back(
        &self,
        region: RawRegion,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<usize> {
        let top = self.back.checked_sub(size)?;
        let aligned = align_bottom(
            (region.begin_addr() + top).checked_add(offset)?,
            alignment,
        );
        let user = aligned.checked_sub(offset)?.checked_sub(region.begin_addr())?;
        let header_at = user.checked_sub(StackHeader::SIZE)?;
        (header_at >= self.front).then_some(user)
    }

    fn fill_alloc(&self, region: RawRegion, user: usize, size: usize) {
        if let Some(pattern) = self.config.alloc_pattern {
            region.fill(user, size, pattern);
        }
    }

    fn fail(&mut self, size: usize, alignment: usize, end: StackEnd) -> AllocError {
        self.stats.record_failure();
        trace!(
            size,
            alignment,
            %end,
            available = self.available(),
            "double-ended allocation failed"
        );
        AllocError::out_of_memory(size, alignment, self.available())
    }

    #[track_caller]
    fn check_order(&self, found: u32, expected: u32) {
        if self.config.lifo_checks && found != expected {
            Misuse::OutOfOrderFree { expected, found }.raise();
        }
    }

    /// Which end owns the region offset `user`, if any
    fn end_of(&self, user: usize) -> Option<StackEnd> {
        if (StackHeader::SIZE..=self.front).contains(&user) {
            Some(StackEnd::Front)
        } else if (self.back + StackHeader::SIZE..=self.capacity()).contains(&user) {
            Some(StackEnd::Back)
        } else {
            None
        }
    }

    /// Region offset of a live allocation on `end`, or misuse.
    #[track_caller]
    fn locate(&self, ptr: NonNull<u8>, end: StackEnd) -> usize {
        let region = self.block.region();
        let addr = ptr.as_ptr() as usize;
        let Some(user) = region.offset_of(ptr.as_ptr()) else {
            Misuse::OutOfRange {
                addr,
                begin: region.begin_addr(),
                end: region.end_addr(),
            }
            .raise()
        };

        match self.end_of(user) {
            Some(owner) if owner == end => user,
            Some(_) => Misuse::WrongEnd { addr, end }.raise(),
            None => Misuse::OutOfRange {
                addr,
                begin: region.begin_addr(),
                end: region.end_addr(),
            }
            .raise(),
        }
    }
}

// SAFETY: front allocations live below `front`, back allocations at or above
// `back`, and `front <= back` always holds, so no two live allocations overlap.
unsafe impl Allocator for DoubleEndedStackAllocator {
    #[inline]
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        self.alloc_front(size, alignment, offset)
    }

    #[inline]
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        // SAFETY: same contract.
        unsafe { self.dealloc_front(ptr) }
    }

    fn reset(&mut self) {
        self.reset_front();
        self.reset_back();
        self.stats.record_reset();
        debug!(kind = "double_ended_stack", "allocator reset");
    }

    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let region = self.block.region();
        let user = match region.offset_of(ptr.as_ptr()) {
            Some(user) if self.end_of(user).is_some() => user,
            _ => Misuse::OutOfRange {
                addr: ptr.as_ptr() as usize,
                begin: region.begin_addr(),
                end: region.end_addr(),
            }
            .raise(),
        };
        let header: StackHeader = region.read_at(user - StackHeader::SIZE);
        header.size as usize
    }
}

impl MemoryUsage for DoubleEndedStackAllocator {
    fn used_memory(&self) -> usize {
        self.front_used() + self.back_used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }
}

impl StatisticsProvider for DoubleEndedStackAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.stats.snapshot()
    }

    fn reset_statistics(&mut self) {
        self.stats.clear();
    }

    fn statistics_enabled(&self) -> bool {
        self.stats.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_allocation_sits_at_block_end() {
        let mut stack = DoubleEndedStackAllocator::new(256).expect("Failed to create stack");
        let ptr = stack.alloc_back(16, 1, 0).expect("alloc back");
        let region = stack.block.region();
        assert_eq!(region.offset_of(ptr.as_ptr()), Some(240));
        assert_eq!(stack.back_used(), 16 + StackHeader::SIZE);
    }

    #[test]
    fn test_back_alignment_with_offset() {
        let mut stack = DoubleEndedStackAllocator::new(256).expect("Failed to create stack");
        stack.alloc_back(3, 1, 0).expect("misalign back");
        let ptr = stack.alloc_back(20, 32, 4).expect("alloc back");
        assert_eq!((ptr.as_ptr() as usize + 4) % 32, 0);
    }

    #[test]
    fn test_back_dealloc_restores_top() {
        let mut stack = DoubleEndedStackAllocator::new(256).expect("Failed to create stack");
        let a = stack.alloc_back(10, 8, 0).expect("alloc a");
        let used = stack.back_used();
        let b = stack.alloc_back(10, 8, 0).expect("alloc b");
        unsafe {
            stack.dealloc_back(b);
            assert_eq!(stack.back_used(), used);
            stack.dealloc_back(a);
        }
        assert_eq!(stack.back_used(), 0);
    }

    #[test]
    fn test_ends_do_not_cross() {
        let mut stack = DoubleEndedStackAllocator::new(128).expect("Failed to create stack");
        stack.alloc_front(60, 1, 0).expect("front");
        stack.alloc_back(40, 1, 0).expect("back");
        assert!(stack.alloc_back(20, 1, 0).unwrap_err().is_exhaustion());
        assert!(stack.alloc_front(20, 1, 0).unwrap_err().is_exhaustion());
        assert!(stack.front_used() <= stack.capacity() - stack.back_used());
    }

    #[test]
    #[should_panic(expected = "was not allocated from the back end")]
    fn test_front_pointer_freed_from_back_panics() {
        let mut stack = DoubleEndedStackAllocator::new(128).expect("Failed to create stack");
        let ptr = stack.alloc_front(8, 1, 0).expect("front");
        unsafe { stack.dealloc_back(ptr) };
    }
}
