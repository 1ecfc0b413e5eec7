//! Slot geometry shared by the fixed and growing pools
//!
//! ```text
//!  first
//!   ↓
//! |pad|[size|user.......][size|user.......][size|user.......]
//!      └──── slot ─────┘
//! ```
//!
//! A free slot stores its free-list link in its first bytes, overlapping the
//! header. Slot starts are placed so that `user + offset` is aligned, and the
//! slot size is a multiple of the alignment, so every slot satisfies the same
//! alignment.

use core::mem::size_of;

use crate::allocator::header::SizeHeader;
use crate::core::RawRegion;
use crate::error::{AllocError, AllocResult, Misuse};
use crate::utils::{align_top, checked_round_up, is_power_of_two};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotLayout {
    pub element_size: usize,
    pub element_alignment: usize,
    pub offset: usize,
    pub slot_size: usize,
}

impl SlotLayout {
    pub(crate) fn new(
        element_size: usize,
        element_alignment: usize,
        offset: usize,
    ) -> AllocResult<Self> {
        if element_size == 0 {
            return Err(AllocError::invalid_config("element size cannot be zero"));
        }
        if u32::try_from(element_size).is_err() {
            return Err(AllocError::invalid_config(format!(
                "element size {element_size} exceeds the 32-bit header limit"
            )));
        }
        let element_alignment = match element_alignment {
            0 => 1,
            a if is_power_of_two(a) => a,
            a => {
                return Err(AllocError::invalid_config(format!(
                    "element alignment must be a power of two, got {a}"
                )));
            }
        };

        let min = (element_size + SizeHeader::SIZE).max(size_of::<*mut u8>());
        let slot_size = checked_round_up(min, element_alignment)
            .ok_or_else(|| AllocError::invalid_config("slot size overflows"))?;

        Ok(Self {
            element_size,
            element_alignment,
            offset,
            slot_size,
        })
    }

    /// Offset from `base_addr` of the first slot start
    pub(crate) fn first_slot(&self, base_addr: usize) -> usize {
        let user = align_top(base_addr + SizeHeader::SIZE + self.offset, self.element_alignment);
        user - self.offset - SizeHeader::SIZE - base_addr
    }

    /// Bytes needed from an arbitrarily aligned base to hold `count` slots
    pub(crate) fn span_for(&self, count: usize) -> AllocResult<usize> {
        count
            .checked_mul(self.slot_size)
            .and_then(|bytes| {
                bytes.checked_add(self.element_alignment + SizeHeader::SIZE + self.offset)
            })
            .ok_or_else(|| {
                AllocError::invalid_config(format!(
                    "{count} slots of {} bytes overflow the address space",
                    self.slot_size
                ))
            })
    }

    /// Panics unless a request fits the slots.
    #[track_caller]
    pub(crate) fn check_request(&self, size: usize, alignment: usize, offset: usize) {
        if size > self.element_size {
            Misuse::OversizedRequest {
                size,
                max: self.element_size,
            }
            .raise();
        }
        if alignment > self.element_alignment {
            Misuse::OveralignedRequest {
                alignment,
                max: self.element_alignment,
            }
            .raise();
        }
        if offset != self.offset {
            Misuse::OffsetMismatch {
                offset,
                expected: self.offset,
            }
            .raise();
        }
    }

    /// Region offset of the slot that starts the user pointer `ptr`.
    ///
    /// Panics if `ptr` lies outside the `slots` slots after `first`, or inside
    /// one without being its user pointer.
    #[track_caller]
    pub(crate) fn slot_of(
        &self,
        region: RawRegion,
        first: usize,
        slots: usize,
        ptr: *const u8,
    ) -> usize {
        let user_begin = first + SizeHeader::SIZE;
        let user_end = user_begin + slots * self.slot_size;
        let relative = region
            .offset_of(ptr)
            .filter(|&o| o >= user_begin && o < user_end)
            .map(|o| o - user_begin);

        let Some(relative) = relative else {
            Misuse::OutOfRange {
                addr: ptr as usize,
                begin: region.begin_addr() + user_begin,
                end: region.begin_addr() + user_end,
            }
            .raise()
        };
        if relative % self.slot_size != 0 {
            Misuse::NotSlotBoundary { addr: ptr as usize }.raise();
        }
        first + relative
    }
}
