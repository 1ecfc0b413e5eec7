//! Allocation headers
//!
//! Every allocation carries a small header immediately before the pointer the
//! allocator returns. Headers are plain `u32` records read and written through
//! [`RawRegion`](crate::core::RawRegion), so they may sit at any alignment.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::error::{AllocError, AllocResult};

/// Header of linear and pool allocations: the requested size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct SizeHeader {
    pub size: u32,
}

impl SizeHeader {
    pub const SIZE: usize = size_of::<Self>();
}

/// Header of stack allocations
///
/// `offset` is the cursor value before the allocation was made, so freeing it
/// rewinds exactly to that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct StackHeader {
    pub offset: u32,
    pub size: u32,
    pub id: u32,
}

impl StackHeader {
    pub const SIZE: usize = size_of::<Self>();
}

const_assert_eq!(size_of::<SizeHeader>(), 4);
const_assert_eq!(size_of::<StackHeader>(), 12);

/// Rejects capacities that headers cannot describe.
pub(crate) fn ensure_header_capacity(capacity: usize) -> AllocResult<()> {
    if capacity == 0 {
        return Err(AllocError::invalid_config("capacity cannot be zero"));
    }
    if u32::try_from(capacity).is_err() {
        return Err(AllocError::invalid_config(format!(
            "capacity {capacity} exceeds the 32-bit header limit of {} bytes",
            u32::MAX
        )));
    }
    Ok(())
}

/// Narrows a value already bounded by a validated capacity.
#[inline]
pub(crate) fn narrow(value: usize) -> u32 {
    // Every caller passes an offset or size inside a block whose capacity
    // passed `ensure_header_capacity`.
    debug_assert!(u32::try_from(value).is_ok());
    value as u32
}
