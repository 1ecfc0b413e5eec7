//! Canary-based bounds checking
//!
//! A bounds checker stamps a known pattern on both sides of an allocation and
//! re-reads it later. A changed pattern means something wrote past the
//! allocation's edge; by then the damage is done, so a mismatch panics.
//!
//! This is a debugging net for overruns, not a security boundary.

use core::ptr::NonNull;

use thiserror::Error;
use tracing::error;

use crate::core::RawRegion;

/// Strategy for guarding the bytes around an allocation
///
/// Every method takes the address of the canary itself, which need not be
/// aligned.
pub trait BoundsChecker {
    /// Bytes occupied by one canary
    const CANARY_SIZE: usize;

    /// Stamps the canary at `ptr`.
    ///
    /// # Safety
    ///
    /// `[ptr, ptr + CANARY_SIZE)` must be writable.
    unsafe fn write_canary(&self, ptr: NonNull<u8>);

    /// Panics unless the canary before an allocation is intact.
    ///
    /// # Safety
    ///
    /// `[ptr, ptr + CANARY_SIZE)` must be readable.
    unsafe fn validate_front_canary(&self, ptr: NonNull<u8>);

    /// Panics unless the canary after an allocation is intact.
    ///
    /// # Safety
    ///
    /// `[ptr, ptr + CANARY_SIZE)` must be readable.
    unsafe fn validate_back_canary(&self, ptr: NonNull<u8>);
}

/// A canary that no longer holds its pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    /// Something wrote below the start of the allocation
    #[error(
        "front canary was not valid at {addr:#x}: expected {expected:#010x}, found {found:#010x}"
    )]
    FrontCanary {
        /// Address of the canary
        addr: usize,
        /// Pattern that was written
        expected: u32,
        /// Pattern read back
        found: u32,
    },

    /// Something wrote past the end of the allocation
    #[error(
        "back canary was not valid at {addr:#x}: expected {expected:#010x}, found {found:#010x}"
    )]
    BackCanary {
        /// Address of the canary
        addr: usize,
        /// Pattern that was written
        expected: u32,
        /// Pattern read back
        found: u32,
    },
}

impl Corruption {
    /// Logs the corruption and panics.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn raise(self) -> ! {
        error!(corruption = %self, "memory corruption detected");
        panic!("{self}");
    }
}

/// Four-byte canary with a fixed pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleBoundsChecker {
    canary: u32,
}

impl SimpleBoundsChecker {
    /// Pattern used by [`new`](Self::new)
    pub const DEFAULT_CANARY: u32 = 0xCACA_CACA;

    /// Checker with the default pattern
    pub const fn new() -> Self {
        Self::with_canary(Self::DEFAULT_CANARY)
    }

    /// Checker with a custom pattern
    pub const fn with_canary(canary: u32) -> Self {
        Self { canary }
    }

    /// The pattern stamped around allocations
    pub const fn canary(&self) -> u32 {
        self.canary
    }

    /// Canary value stored at `ptr`
    ///
    /// # Safety
    ///
    /// `[ptr, ptr + 4)` must be readable.
    unsafe fn read(ptr: NonNull<u8>) -> u32 {
        // SAFETY: the caller guarantees the four bytes are readable.
        unsafe { RawRegion::from_raw_parts(ptr, Self::CANARY_SIZE) }.read_at(0)
    }
}

impl Default for SimpleBoundsChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundsChecker for SimpleBoundsChecker {
    const CANARY_SIZE: usize = size_of::<u32>();

    #[inline]
    unsafe fn write_canary(&self, ptr: NonNull<u8>) {
        // SAFETY: the caller guarantees the four bytes are writable.
        unsafe { RawRegion::from_raw_parts(ptr, Self::CANARY_SIZE) }.write_at(0, self.canary);
    }

    #[inline]
    #[track_caller]
    unsafe fn validate_front_canary(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller's contract.
        let found = unsafe { Self::read(ptr) };
        if found != self.canary {
            Corruption::FrontCanary {
                addr: ptr.as_ptr() as usize,
                expected: self.canary,
                found,
            }
            .raise();
        }
    }

    #[inline]
    #[track_caller]
    unsafe fn validate_back_canary(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller's contract.
        let found = unsafe { Self::read(ptr) };
        if found != self.canary {
            Corruption::BackCanary {
                addr: ptr.as_ptr() as usize,
                expected: self.canary,
                found,
            }
            .raise();
        }
    }
}

/// Checker that adds no bytes and checks nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoBoundsChecker;

impl BoundsChecker for NoBoundsChecker {
    const CANARY_SIZE: usize = 0;

    #[inline(always)]
    unsafe fn write_canary(&self, _ptr: NonNull<u8>) {}

    #[inline(always)]
    unsafe fn validate_front_canary(&self, _ptr: NonNull<u8>) {}

    #[inline(always)]
    unsafe fn validate_back_canary(&self, _ptr: NonNull<u8>) {}
}
