//! Main stack allocator implementation
//!
//! # Memory Layout
//! ```text
//! block start                                          cursor       block end
//! |[pad][offset|size|id][user 0...][pad][offset|size|id][user 1...]|..........|
//!        └─ offset = cursor before allocation 0
//! ```
//!
//! ## Invariants
//!
//! - the header of allocation `n` records the cursor value before it was
//!   made, so freeing it restores the stack to exactly that state
//! - ids increase by one per allocation; the newest live allocation has id
//!   `last_id`

use core::ptr::NonNull;

use tracing::{debug, trace};

use super::StackConfig;
use crate::allocator::header::{StackHeader, ensure_header_capacity, narrow};
use crate::allocator::{Allocator, AllocatorStats, StatisticsProvider, StatsTracker};
use crate::core::{MemoryBlock, MemoryUsage, RawRegion};
use crate::error::{AllocError, AllocResult, Misuse};
use crate::utils::{checked_align_top, normalize_alignment};

/// Stack allocator that supports LIFO allocation and deallocation
///
/// Memory can only be released in reverse order of allocation. With
/// [`StackConfig::lifo_checks`] enabled an out-of-order free panics; without
/// it, freeing an older allocation silently releases everything after it too.
#[derive(Debug)]
pub struct StackAllocator {
    block: MemoryBlock,
    cursor: usize,
    last_id: u32,
    config: StackConfig,
    stats: StatsTracker,
}

impl StackAllocator {
    /// Creates a stack over `capacity` bytes of freshly reserved memory.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero capacity or one above `u32::MAX`, and
    /// `System` if the memory cannot be reserved.
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, StackConfig::default())
    }

    /// Creates a stack with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_config(capacity: usize, config: StackConfig) -> AllocResult<Self> {
        ensure_header_capacity(capacity)?;
        Ok(Self::from_block(MemoryBlock::reserve(capacity)?, config))
    }

    /// Creates a stack over caller-owned memory `[begin, end)`.
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
        debug!(
            kind = "stack",
            capacity = block.region().len(),
            owned = block.is_owned(),
            lifo_checks = config.lifo_checks,
            "allocator created"
        );
        Self {
            stats: StatsTracker::new(config.track_stats),
            block,
            cursor: 0,
            last_id: 0,
            config,
        }
    }

    /// Total size of the block
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block.region().len()
    }

    /// Bytes consumed so far, headers and padding included
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes left above the stack top
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Number of live allocations
    #[inline]
    pub fn depth(&self) -> u32 {
        self.last_id
    }

    /// Current configuration
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    fn place(
        &self,
        region: RawRegion,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<usize> {
        let unaligned = region
            .begin_addr()
            .checked_add(self.cursor + StackHeader::SIZE)?
            .checked_add(offset)?;
        let user = checked_align_top(unaligned, alignment)? - offset - region.begin_addr();
        let end = user.checked_add(size)?;
        (end <= region.len()).then_some(user)
    }

    #[track_caller]
    fn locate(&self, ptr: NonNull<u8>) -> usize {
        let region = self.block.region();
        match region.offset_of(ptr.as_ptr()) {
            Some(offset) if offset >= StackHeader::SIZE && offset <= self.cursor => offset,
            _ => Misuse::OutOfRange {
                addr: ptr.as_ptr() as usize,
                begin: region.begin_addr(),
                end: region.begin_addr() + self.cursor,
            }
            .raise(),
        }
    }
}

// SAFETY: allocations are disjoint slices below the cursor, `place` aligns
// `ptr + offset`, and the cursor only moves back past an allocation when that
// allocation (or an older one) is freed.
unsafe impl Allocator for StackAllocator {
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        let region = self.block.region();

        let Some(user) = self.place(region, size, alignment, offset) else {
            self.stats.record_failure();
            trace!(size, alignment, available = self.available(), "stack allocation failed");
            return Err(AllocError::out_of_memory(size, alignment, self.available()));
        };

        let id = self.last_id.wrapping_add(1);
        region.write_at(
            user - StackHeader::SIZE,
            StackHeader {
                offset: narrow(self.cursor),
                size: narrow(size),
                id,
            },
        );
        if let Some(pattern) = self.config.alloc_pattern {
            region.fill(user, size, pattern);
        }
        self.cursor = user + size;
        self.last_id = id;
        self.stats.record_alloc(size);

        trace!(size, alignment, offset, user, id, "stack alloc");
        Ok(region.ptr_at(user))
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        let user = self.locate(ptr);
        let region = self.block.region();
        let header: StackHeader = region.read_at(user - StackHeader::SIZE);

        if self.config.lifo_checks && header.id != self.last_id {
            Misuse::OutOfOrderFree {
                expected: self.last_id,
                found: header.id,
            }
            .raise();
        }

        let rewind = header.offset as usize;
        if let Some(pattern) = self.config.dealloc_pattern {
            region.fill(rewind, self.cursor - rewind, pattern);
        }
        self.cursor = rewind;
        self.last_id = header.id.wrapping_sub(1);
        self.stats.record_dealloc(header.size as usize);

        trace!(user, id = header.id, cursor = rewind, "stack dealloc");
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.last_id = 0;
        self.stats.record_reset();
        debug!(kind = "stack", "allocator reset");
    }

    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let user = self.locate(ptr);
        let header: StackHeader = self.block.region().read_at(user - StackHeader::SIZE);
        header.size as usize
    }
}

impl MemoryUsage for StackAllocator {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }
}

impl StatisticsProvider for StackAllocator {
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
    fn test_free_rewinds_to_previous_top() {
        let mut stack = StackAllocator::new(1024).expect("Failed to create stack");
        let a = stack.alloc(10, 8, 0).expect("alloc a");
        let top = stack.used();
        let b = stack.alloc(100, 64, 0).expect("alloc b");

        unsafe { stack.dealloc(b) };
        assert_eq!(stack.used(), top);
        assert_eq!(stack.depth(), 1);

        unsafe { stack.dealloc(a) };
        assert_eq!(stack.used(), 0);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_reuse_after_free_returns_same_address() {
        let mut stack = StackAllocator::new(256).expect("Failed to create stack");
        let a = stack.alloc(32, 16, 0).expect("alloc");
        unsafe { stack.dealloc(a) };
        let b = stack.alloc(32, 16, 0).expect("alloc");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unchecked_free_releases_newer_allocations() {
        let mut stack =
            StackAllocator::with_config(256, StackConfig::production())
                .expect("Failed to create stack");
        let a = stack.alloc(8, 1, 0).expect("alloc a");
        stack.alloc(8, 1, 0).expect("alloc b");
        unsafe { stack.dealloc(a) };
        assert_eq!(stack.used(), 0);
    }

    #[test]
    #[should_panic(expected = "LIFO order")]
    fn test_out_of_order_free_panics() {
        let mut stack =
            StackAllocator::with_config(256, StackConfig::debug()).expect("Failed to create stack");
        let a = stack.alloc(8, 1, 0).expect("alloc a");
        stack.alloc(8, 1, 0).expect("alloc b");
        unsafe { stack.dealloc(a) };
    }

    #[test]
    fn test_dealloc_pattern_covers_released_bytes() {
        let mut stack =
            StackAllocator::with_config(64, StackConfig::debug()).expect("Failed to create stack");
        let ptr = stack.alloc(16, 1, 0).expect("alloc");
        unsafe {
            stack.dealloc(ptr);
            let bytes = core::slice::from_raw_parts(ptr.as_ptr(), 16);
            assert!(bytes.iter().all(|&b| b == 0xDD));
        }
    }
}
