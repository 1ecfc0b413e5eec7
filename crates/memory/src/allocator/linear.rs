//! Linear (bump) allocator
//!
//! Allocations are carved sequentially from a single block by advancing a
//! cursor. Individual deallocation does nothing beyond validating the pointer;
//! memory is reclaimed all at once by [`Allocator::reset`].
//!
//! # Memory Layout
//! ```text
//! block start                                   cursor            block end
//! |[pad][size][user 0....][pad][size][user 1...]|.................|
//! ```
//!
//! Every allocation is preceded by a 4-byte size header so that
//! [`Allocator::allocation_size`] works without outside bookkeeping.

use core::ptr::NonNull;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::header::{SizeHeader, ensure_header_capacity, narrow};
use super::stats::{AllocatorStats, StatisticsProvider, StatsTracker};
use super::traits::Allocator;
use crate::core::{MemoryBlock, MemoryUsage, RawRegion};
use crate::error::{AllocError, AllocResult, Misuse};
use crate::utils::{checked_align_top, normalize_alignment};

/// Configuration for linear allocator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xAA)
            } else {
                None
            },
        }
    }
}

impl LinearConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xAA),
        }
    }
}

/// Bump allocator over a fixed block
#[derive(Debug)]
pub struct LinearAllocator {
    block: MemoryBlock,
    /// Offset of the first free byte
    cursor: usize,
    config: LinearConfig,
    stats: StatsTracker,
}

impl LinearAllocator {
    /// Creates an allocator over `capacity` bytes of freshly reserved memory.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero capacity or one above `u32::MAX`, and
    /// `System` if the memory cannot be reserved.
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, LinearConfig::default())
    }

    /// Creates an allocator with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_config(capacity: usize, config: LinearConfig) -> AllocResult<Self> {
        ensure_header_capacity(capacity)?;
        Ok(Self::from_block(MemoryBlock::reserve(capacity)?, config))
    }

    /// Creates an allocator over caller-owned memory `[begin, end)`.
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
        unsafe { Self::from_raw_range_with_config(begin, end, LinearConfig::default()) }
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
        config: LinearConfig,
    ) -> AllocResult<Self> {
        // SAFETY: forwarded from the caller's contract.
        let block = unsafe { MemoryBlock::borrowed(begin, end)? };
        ensure_header_capacity(block.region().len())?;
        Ok(Self::from_block(block, config))
    }

    fn from_block(block: MemoryBlock, config: LinearConfig) -> Self {
        debug!(
            kind = "linear",
            capacity = block.region().len(),
            owned = block.is_owned(),
            "allocator created"
        );
        Self {
            stats: StatsTracker::new(config.track_stats),
            block,
            cursor: 0,
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

    /// Bytes left after the cursor
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Current configuration
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Region offset of the user pointer for a request, if it fits.
    fn place(
        &self,
        region: RawRegion,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<usize> {
        let unaligned = region
            .begin_addr()
            .checked_add(self.cursor + SizeHeader::SIZE)?
            .checked_add(offset)?;
        let user = checked_align_top(unaligned, alignment)? - offset - region.begin_addr();
        let end = user.checked_add(size)?;
        (end <= region.len()).then_some(user)
    }

    /// Region offset of a live allocation, or misuse.
    #[track_caller]
    fn locate(&self, ptr: NonNull<u8>) -> usize {
        let region = self.block.region();
        match region.offset_of(ptr.as_ptr()) {
            Some(offset) if offset >= SizeHeader::SIZE && offset <= self.cursor => offset,
            _ => Misuse::OutOfRange {
                addr: ptr.as_ptr() as usize,
                begin: region.begin_addr(),
                end: region.begin_addr() + self.cursor,
            }
            .raise(),
        }
    }
}

// SAFETY: allocations are disjoint slices of the block ahead of the cursor and
// `place` aligns `ptr + offset`. They stay valid until `reset` or drop.
unsafe impl Allocator for LinearAllocator {
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        let region = self.block.region();

        let Some(user) = self.place(region, size, alignment, offset) else {
            self.stats.record_failure();
            trace!(size, alignment, available = self.available(), "linear allocation failed");
            return Err(AllocError::out_of_memory(size, alignment, self.available()));
        };

        region.write_at(
            user - SizeHeader::SIZE,
            SizeHeader {
                size: narrow(size),
            },
        );
        if let Some(pattern) = self.config.alloc_pattern {
            region.fill(user, size, pattern);
        }
        self.cursor = user + size;
        self.stats.record_alloc(size);

        trace!(size, alignment, offset, user, "linear alloc");
        Ok(region.ptr_at(user))
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        let user = self.locate(ptr);
        let header: SizeHeader = self.block.region().read_at(user - SizeHeader::SIZE);
        self.stats.record_dealloc(header.size as usize);
        trace!(user, size = header.size, "linear dealloc (no-op)");
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.stats.record_reset();
        debug!(kind = "linear", "allocator reset");
    }

    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let user = self.locate(ptr);
        let header: SizeHeader = self.block.region().read_at(user - SizeHeader::SIZE);
        header.size as usize
    }
}

impl MemoryUsage for LinearAllocator {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }
}

impl StatisticsProvider for LinearAllocator {
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
    fn test_sequential_allocations_do_not_overlap() {
        let mut allocator = LinearAllocator::new(1024).expect("Failed to create allocator");
        let a = allocator.alloc(10, 1, 0).expect("alloc a");
        let b = allocator.alloc(10, 1, 0).expect("alloc b");
        assert!(b.as_ptr() as usize >= a.as_ptr() as usize + 10 + SizeHeader::SIZE);
    }

    #[test]
    fn test_offset_aligns_the_outer_pointer() {
        let mut allocator = LinearAllocator::new(1024).expect("Failed to create allocator");
        allocator.alloc(3, 1, 0).expect("misalign cursor");
        let ptr = allocator.alloc(32, 16, 4).expect("alloc");
        assert_eq!((ptr.as_ptr() as usize + 4) % 16, 0);
    }

    #[test]
    fn test_exact_fit_then_exhaustion() {
        let mut allocator =
            LinearAllocator::with_config(64, LinearConfig::debug())
                .expect("Failed to create allocator");
        allocator.alloc(60, 1, 0).expect("exact fit");
        assert_eq!(allocator.available(), 0);

        let err = allocator.alloc(1, 1, 0).unwrap_err();
        assert!(err.is_exhaustion());
        assert_eq!(allocator.statistics().failed_allocations, 1);
    }

    #[test]
    fn test_fill_pattern_applied() {
        let mut allocator =
            LinearAllocator::with_config(64, LinearConfig::debug())
                .expect("Failed to create allocator");
        let ptr = allocator.alloc(8, 1, 0).expect("alloc");
        let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 8) };
        assert!(bytes.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LinearAllocator::new(0).unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig { .. }));
    }

    #[test]
    #[should_panic(expected = "is not in memory range")]
    fn test_dealloc_foreign_pointer_panics() {
        let mut allocator = LinearAllocator::new(64).expect("Failed to create allocator");
        let mut other = [0u8; 16];
        unsafe { allocator.dealloc(NonNull::from(&mut other).cast()) };
    }
}
