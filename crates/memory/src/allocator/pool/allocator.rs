//! Main pool allocator implementation
//!
//! # Safety
//!
//! - Fixed-size slots organized in an intrusive [`FreeList`]
//! - Free slots store the next link in their first bytes
//! - A deallocated pointer is validated (range and slot boundary) before its
//!   slot goes back on the list
//!
//! ## Invariants
//!
//! - every slot start is `first + k * slot_size` for `k < element_count`
//! - a slot is either on the free list or handed out, never both (as long as
//!   callers do not free twice)

use core::alloc::Layout;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use tracing::{debug, trace};

use super::PoolConfig;
use super::layout::SlotLayout;
use crate::allocator::header::{SizeHeader, narrow};
use crate::allocator::{Allocator, AllocatorStats, StatisticsProvider, StatsTracker};
use crate::core::{MemoryBlock, MemoryUsage};
use crate::error::{AllocError, AllocResult, Misuse};
use crate::free_list::FreeList;
use crate::utils::normalize_alignment;

/// Pool allocator for fixed-size elements
///
/// All allocations share one size and alignment fixed at construction;
/// requests may be smaller but never larger. Allocation and deallocation are
/// O(1).
#[derive(Debug)]
pub struct PoolAllocator {
    block: MemoryBlock,
    layout: SlotLayout,
    /// Region offset of the first slot
    first: usize,
    element_count: usize,
    free: FreeList,
    live: usize,
    config: PoolConfig,
    stats: StatsTracker,
}

impl PoolAllocator {
    /// Creates a pool of `element_count` elements of `element_size` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero size or count or a non-power-of-two
    /// alignment, and `System` if the memory cannot be reserved.
    pub fn new(
        element_size: usize,
        element_alignment: usize,
        element_count: usize,
    ) -> AllocResult<Self> {
        Self::with_config(
            element_size,
            element_alignment,
            element_count,
            PoolConfig::default(),
        )
    }

    /// Creates a pool with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_config(
        element_size: usize,
        element_alignment: usize,
        element_count: usize,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        let layout = SlotLayout::new(element_size, element_alignment, config.offset)?;
        check_count(element_count)?;
        let block = MemoryBlock::reserve(layout.span_for(element_count)?)?;
        Self::from_block(block, layout, element_count, config)
    }

    /// Creates a pool sized and aligned for `T`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new); zero-sized types are rejected.
    pub fn for_type<T>(element_count: usize) -> AllocResult<Self> {
        Self::new(size_of::<T>(), align_of::<T>(), element_count)
    }

    /// Creates a pool whose elements fit `layout`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn for_layout(layout: Layout, element_count: usize) -> AllocResult<Self> {
        Self::new(layout.size(), layout.align(), element_count)
    }

    /// Creates a pool over caller-owned memory `[begin, end)`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an invalid element geometry, or a range that
    /// cannot hold `element_count` slots after alignment.
    ///
    /// # Safety
    ///
    /// The range must be valid for reads and writes, and unused by anything
    /// else, for as long as the allocator is alive.
    pub unsafe fn from_raw_range(
        begin: NonNull<u8>,
        end: NonNull<u8>,
        element_size: usize,
        element_alignment: usize,
        element_count: usize,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        let layout = SlotLayout::new(element_size, element_alignment, config.offset)?;
        check_count(element_count)?;
        // SAFETY: forwarded from the caller's contract.
        let block = unsafe { MemoryBlock::borrowed(begin, end)? };
        Self::from_block(block, layout, element_count, config)
    }

    fn from_block(
        block: MemoryBlock,
        layout: SlotLayout,
        element_count: usize,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        let region = block.region();
        let first = layout.first_slot(region.begin_addr());
        let needed = element_count
            .checked_mul(layout.slot_size)
            .and_then(|bytes| bytes.checked_add(first));
        if needed.is_none_or(|needed| needed > region.len()) {
            return Err(AllocError::invalid_config(format!(
                "{} bytes cannot hold {element_count} slots of {} bytes",
                region.len(),
                layout.slot_size
            )));
        }

        // SAFETY: the slots lie inside the block (checked above), the block
        // outlives the list, and nothing else uses the memory yet.
        let free =
            unsafe { FreeList::with_count(region.ptr_at(first), layout.slot_size, element_count) };

        debug!(
            kind = "pool",
            element_size = layout.element_size,
            element_alignment = layout.element_alignment,
            slot_size = layout.slot_size,
            element_count,
            owned = block.is_owned(),
            "allocator created"
        );

        Ok(Self {
            stats: StatsTracker::new(config.track_stats),
            block,
            layout,
            first,
            element_count,
            free,
            live: 0,
            config,
        })
    }

    /// Largest request the pool accepts
    #[inline]
    pub fn element_size(&self) -> usize {
        self.layout.element_size
    }

    /// Strictest alignment the pool accepts
    #[inline]
    pub fn element_alignment(&self) -> usize {
        self.layout.element_alignment
    }

    /// Bytes per slot, header included
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.layout.slot_size
    }

    /// Total number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.element_count
    }

    /// Slots currently handed out
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Slots ready to hand out
    #[inline]
    pub fn available(&self) -> usize {
        self.element_count - self.live
    }

    /// Current configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

pub(super) fn check_count(element_count: usize) -> AllocResult<()> {
    if element_count == 0 {
        return Err(AllocError::invalid_config("element count cannot be zero"));
    }
    Ok(())
}

// SAFETY: each handed-out pointer is the user part of a distinct slot taken
// off the free list, and slot placement aligns `ptr + offset`.
unsafe impl Allocator for PoolAllocator {
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        self.layout.check_request(size, alignment, offset);

        let Some(slot) = self.free.get_chunk() else {
            self.stats.record_failure();
            trace!(size, capacity = self.element_count, "pool exhausted");
            return Err(AllocError::CapacityExhausted {
                capacity: self.element_count,
            });
        };

        let region = self.block.region();
        let slot = slot.as_ptr() as usize - region.begin_addr();
        let user = slot + SizeHeader::SIZE;
        region.write_at(slot, SizeHeader { size: narrow(size) });
        if let Some(pattern) = self.config.alloc_pattern {
            region.fill(user, size, pattern);
        }
        self.live += 1;
        self.stats.record_alloc(size);

        trace!(size, slot, "pool alloc");
        Ok(region.ptr_at(user))
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        let region = self.block.region();
        let slot = self
            .layout
            .slot_of(region, self.first, self.element_count, ptr.as_ptr());
        let header: SizeHeader = region.read_at(slot);
        if self.live == 0 {
            Misuse::FreeWithoutLiveSlots {
                addr: ptr.as_ptr() as usize,
            }
            .raise();
        }

        if let Some(pattern) = self.config.dealloc_pattern {
            region.fill(slot + SizeHeader::SIZE, self.layout.element_size, pattern);
        }
        // SAFETY: `slot` is a validated slot start of this pool.
        unsafe { self.free.return_chunk(region.ptr_at(slot)) };
        self.live -= 1;
        self.stats.record_dealloc(header.size as usize);

        trace!(slot, "pool dealloc");
    }

    fn reset(&mut self) {
        let region = self.block.region();
        // SAFETY: same slots as at construction; every outstanding pointer is
        // invalidated by the reset.
        self.free = unsafe {
            FreeList::with_count(
                region.ptr_at(self.first),
                self.layout.slot_size,
                self.element_count,
            )
        };
        self.live = 0;
        self.stats.record_reset();
        debug!(kind = "pool", "allocator reset");
    }

    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let region = self.block.region();
        let slot = self
            .layout
            .slot_of(region, self.first, self.element_count, ptr.as_ptr());
        region.read_at::<SizeHeader>(slot).size as usize
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        self.live * self.layout.slot_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available() * self.layout.slot_size)
    }
}

impl StatisticsProvider for PoolAllocator {
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
