//! Growing pool allocator
//!
//! Reserves address space for the maximum number of elements up front but
//! commits physical memory only for `element_count` slots at a time. When the
//! free list runs dry the pool commits the next batch in place, so existing
//! pointers never move.
//!
//! ```text
//! base                          committed          reserved
//! |[slot][slot]...[slot][slot]|.......(no backing)........|
//! ```

use core::ptr::NonNull;

use memrealm_system::VirtualRegion;
use memrealm_system::utils::format_bytes;
use tracing::{debug, error, trace};

use super::allocator::check_count;
use super::config::{CapacityPolicy, GrowingPoolConfig};
use super::layout::SlotLayout;
use crate::allocator::header::{SizeHeader, narrow};
use crate::allocator::{Allocator, AllocatorStats, StatisticsProvider, StatsTracker};
use crate::core::{MemoryUsage, RawRegion};
use crate::error::{AllocError, AllocResult, Misuse};
use crate::free_list::FreeList;
use crate::utils::normalize_alignment;

/// Pool that commits memory in batches up to a fixed maximum
pub struct GrowingPoolAllocator {
    memory: VirtualRegion,
    /// View over the committed prefix of `memory`
    committed: RawRegion,
    layout: SlotLayout,
    first: usize,
    grow_by: usize,
    committed_slots: usize,
    max_slots: usize,
    free: FreeList,
    live: usize,
    config: GrowingPoolConfig,
    stats: StatsTracker,
}

// SAFETY: `committed` views memory owned by `memory`, which moves with it.
unsafe impl Send for GrowingPoolAllocator {}

impl GrowingPoolAllocator {
    /// Creates a pool with `element_count` slots committed, growing by
    /// `element_count` at a time up to `element_count_max`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an invalid element geometry, a zero count, or a
    /// maximum below the initial count; `System` if the address space cannot
    /// be reserved or committed.
    pub fn new(
        element_size: usize,
        element_alignment: usize,
        element_count: usize,
        element_count_max: usize,
    ) -> AllocResult<Self> {
        Self::with_config(
            element_size,
            element_alignment,
            element_count,
            element_count_max,
            GrowingPoolConfig::default(),
        )
    }

    /// Creates a growing pool with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_config(
        element_size: usize,
        element_alignment: usize,
        element_count: usize,
        element_count_max: usize,
        config: GrowingPoolConfig,
    ) -> AllocResult<Self> {
        let layout = SlotLayout::new(element_size, element_alignment, config.pool.offset)?;
        check_count(element_count)?;
        if element_count_max < element_count {
            return Err(AllocError::invalid_config(format!(
                "maximum element count {element_count_max} is below the initial count {element_count}"
            )));
        }

        let memory = VirtualRegion::reserve(layout.span_for(element_count_max)?)?;
        let first = layout.first_slot(memory.base().as_ptr() as usize);
        // SAFETY: nothing is committed yet, so the view is empty.
        let committed = unsafe { RawRegion::from_raw_parts(memory.base(), 0) };

        debug!(
            kind = "growing_pool",
            element_size = layout.element_size,
            slot_size = layout.slot_size,
            element_count,
            element_count_max,
            reserved = %format_bytes(memory.reserved_len()),
            "allocator created"
        );

        let mut pool = Self {
            stats: StatsTracker::new(config.pool.track_stats),
            memory,
            committed,
            layout,
            first,
            grow_by: element_count,
            committed_slots: 0,
            max_slots: element_count_max,
            free: FreeList::empty(),
            live: 0,
            config,
        };
        pool.grow(element_count)?;
        Ok(pool)
    }

    /// Slots backed by physical memory
    #[inline]
    pub fn committed_slots(&self) -> usize {
        self.committed_slots
    }

    /// Slots the pool may grow to
    #[inline]
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Slots currently handed out
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Largest request the pool accepts
    #[inline]
    pub fn element_size(&self) -> usize {
        self.layout.element_size
    }

    /// Bytes between consecutive slots, header included
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.layout.slot_size
    }

    /// Current configuration
    pub fn config(&self) -> &GrowingPoolConfig {
        &self.config
    }

    /// Commits `slots` more slots and threads them onto the free list.
    fn grow(&mut self, slots: usize) -> AllocResult<()> {
        debug_assert!(self.free.is_empty());
        let start = self.first + self.committed_slots * self.layout.slot_size;
        self.memory
            .commit_to(start + slots * self.layout.slot_size)?;
        // SAFETY: `commit_to` made the prefix up to `committed_len` readable
        // and writable; it stays mapped while `self.memory` lives.
        self.committed =
            unsafe { RawRegion::from_raw_parts(self.memory.base(), self.memory.committed_len()) };

        // SAFETY: the new slots are committed, lie past every slot threaded so
        // far, and are not in use.
        self.free = unsafe {
            FreeList::with_count(self.committed.ptr_at(start), self.layout.slot_size, slots)
        };
        self.committed_slots += slots;

        debug!(
            added = slots,
            committed_slots = self.committed_slots,
            committed = %format_bytes(self.memory.committed_len()),
            "growing pool grew"
        );
        Ok(())
    }

    fn exhausted(&mut self) -> AllocError {
        self.stats.record_failure();
        let err = AllocError::CapacityExhausted {
            capacity: self.max_slots,
        };
        if self.config.capacity_policy == CapacityPolicy::Abort {
            error!(max_slots = self.max_slots, "growing pool exhausted, aborting");
            panic!("{err}");
        }
        trace!(max_slots = self.max_slots, "growing pool exhausted");
        err
    }
}

// SAFETY: slots are disjoint, never move (growth commits in place), and slot
// placement aligns `ptr + offset`.
unsafe impl Allocator for GrowingPoolAllocator {
    fn alloc(&mut self, size: usize, alignment: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let alignment = normalize_alignment(alignment);
        self.layout.check_request(size, alignment, offset);

        if self.free.is_empty() {
            if self.committed_slots == self.max_slots {
                return Err(self.exhausted());
            }
            let batch = self.grow_by.min(self.max_slots - self.committed_slots);
            if let Err(err) = self.grow(batch) {
                self.stats.record_failure();
                return Err(err);
            }
        }

        let Some(slot) = self.free.get_chunk() else {
            return Err(self.exhausted());
        };

        let region = self.committed;
        let slot = slot.as_ptr() as usize - region.begin_addr();
        let user = slot + SizeHeader::SIZE;
        region.write_at(slot, SizeHeader { size: narrow(size) });
        if let Some(pattern) = self.config.pool.alloc_pattern {
            region.fill(user, size, pattern);
        }
        self.live += 1;
        self.stats.record_alloc(size);

        trace!(size, slot, "growing pool alloc");
        Ok(region.ptr_at(user))
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>) {
        let region = self.committed;
        let slot = self
            .layout
            .slot_of(region, self.first, self.committed_slots, ptr.as_ptr());
        let header: SizeHeader = region.read_at(slot);
        if self.live == 0 {
            Misuse::FreeWithoutLiveSlots {
                addr: ptr.as_ptr() as usize,
            }
            .raise();
        }

        if let Some(pattern) = self.config.pool.dealloc_pattern {
            region.fill(slot + SizeHeader::SIZE, self.layout.element_size, pattern);
        }
        // SAFETY: `slot` is a validated, committed slot start of this pool.
        unsafe { self.free.return_chunk(region.ptr_at(slot)) };
        self.live -= 1;
        self.stats.record_dealloc(header.size as usize);

        trace!(slot, "growing pool dealloc");
    }

    /// Frees every slot. Committed memory stays committed.
    fn reset(&mut self) {
        // SAFETY: every committed slot is threaded again; outstanding pointers
        // are invalidated by the reset.
        self.free = unsafe {
            FreeList::with_count(
                self.committed.ptr_at(self.first),
                self.layout.slot_size,
                self.committed_slots,
            )
        };
        self.live = 0;
        self.stats.record_reset();
        debug!(kind = "growing_pool", committed_slots = self.committed_slots, "allocator reset");
    }

    unsafe fn allocation_size(&self, ptr: NonNull<u8>) -> usize {
        let slot = self
            .layout
            .slot_of(self.committed, self.first, self.committed_slots, ptr.as_ptr());
        self.committed.read_at::<SizeHeader>(slot).size as usize
    }
}

impl MemoryUsage for GrowingPoolAllocator {
    fn used_memory(&self) -> usize {
        self.live * self.layout.slot_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some((self.max_slots - self.live) * self.layout.slot_size)
    }
}

impl StatisticsProvider for GrowingPoolAllocator {
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

impl core::fmt::Debug for GrowingPoolAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GrowingPoolAllocator")
            .field("memory", &self.memory)
            .field("slot_size", &self.layout.slot_size)
            .field("committed_slots", &self.committed_slots)
            .field("max_slots", &self.max_slots)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_commit() {
        let pool = GrowingPoolAllocator::new(64, 8, 10, 100).expect("Failed to create pool");
        assert_eq!(pool.committed_slots(), 10);
        assert_eq!(pool.max_slots(), 100);
    }

    #[test]
    fn test_growth_keeps_existing_pointers() {
        let mut pool = GrowingPoolAllocator::new(16, 8, 2, 6).expect("Failed to create pool");
        let first = pool.alloc(16, 8, 0).expect("alloc");
        unsafe { first.as_ptr().write_bytes(0x5A, 16) };

        for _ in 0..5 {
            pool.alloc(16, 8, 0).expect("alloc");
        }
        assert_eq!(pool.committed_slots(), 6);
        assert_eq!(unsafe { *first.as_ptr().add(15) }, 0x5A);
    }

    #[test]
    fn test_last_batch_is_clamped_to_max() {
        let mut pool = GrowingPoolAllocator::new(16, 8, 4, 6).expect("Failed to create pool");
        for _ in 0..5 {
            pool.alloc(16, 8, 0).expect("alloc");
        }
        assert_eq!(pool.committed_slots(), 6);
    }

    #[test]
    fn test_max_below_initial_rejected() {
        let err = GrowingPoolAllocator::new(16, 8, 10, 5).unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig { .. }));
    }
}
