//! Owned virtual memory reservations

use std::fmt;
use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::error::{SystemError, SystemResult};
use crate::utils::format_bytes;
use crate::virtual_memory::{
    commit_physical_memory, decommit_physical_memory, free_address_space, page_size,
    reserve_address_space, round_to_page,
};

/// A reserved range of address space with a committed prefix.
///
/// `[base, base + committed_len)` is readable and writable;
/// `[base + committed_len, base + reserved_len)` is reserved only.
/// The reservation is released exactly once, when the region is dropped.
///
/// # Examples
///
/// ```
/// use memrealm_system::VirtualRegion;
///
/// let mut region = VirtualRegion::reserve(1 << 20)?;
/// assert_eq!(region.committed_len(), 0);
///
/// region.commit_to(100)?;
/// assert!(region.committed_len() >= 100);
/// # Ok::<(), memrealm_system::SystemError>(())
/// ```
pub struct VirtualRegion {
    base: NonNull<u8>,
    reserved: usize,
    committed: usize,
}

// SAFETY: the region exclusively owns its mapping; moving it to another thread
// moves that ownership with it.
unsafe impl Send for VirtualRegion {}

impl VirtualRegion {
    /// Reserves at least `size` bytes (rounded up to the page size) without
    /// committing any of them.
    pub fn reserve(size: usize) -> SystemResult<Self> {
        let reserved = round_to_page(size).ok_or_else(|| {
            SystemError::InvalidInput(format!("reservation of {size} bytes overflows"))
        })?;
        let base = reserve_address_space(reserved)?;

        debug!(
            addr = base.as_ptr() as usize,
            reserved = %format_bytes(reserved),
            "reserved virtual region"
        );

        Ok(Self {
            base,
            reserved,
            committed: 0,
        })
    }

    /// Reserves and commits at least `size` bytes in one step.
    pub fn reserve_committed(size: usize) -> SystemResult<Self> {
        let mut region = Self::reserve(size)?;
        region.commit_to(region.reserved)?;
        Ok(region)
    }

    /// Grows the committed prefix so that at least `len` bytes are usable.
    ///
    /// `len` is rounded up to the page size. Requests beyond the reservation
    /// are an error; requests at or below the current committed length are a
    /// no-op.
    pub fn commit_to(&mut self, len: usize) -> SystemResult<()> {
        if len > self.reserved {
            return Err(SystemError::InvalidInput(format!(
                "cannot commit {len} bytes of a {} byte reservation",
                self.reserved
            )));
        }

        // `len <= reserved` and `reserved` is a page multiple, so this cannot overflow.
        let target = len.next_multiple_of(page_size());
        if target <= self.committed {
            return Ok(());
        }

        // SAFETY: `[committed, target)` lies inside our live reservation and
        // `committed` is always a page multiple.
        unsafe {
            commit_physical_memory(self.base.add(self.committed), target - self.committed)?;
        }
        self.committed = target;
        Ok(())
    }

    /// Shrinks the committed prefix to `len` bytes (rounded up to the page
    /// size), returning the tail pages to the OS.
    ///
    /// # Safety
    ///
    /// Nothing may access memory beyond the new committed length until it is
    /// committed again.
    pub unsafe fn decommit_to(&mut self, len: usize) -> SystemResult<()> {
        let target = len.min(self.reserved).next_multiple_of(page_size());
        if target >= self.committed {
            return Ok(());
        }

        // SAFETY: `[target, committed)` lies inside our live reservation, is
        // page-aligned, and the caller promises not to touch it.
        unsafe {
            decommit_physical_memory(self.base.add(target), self.committed - target)?;
        }
        self.committed = target;
        Ok(())
    }

    /// Base address of the reservation
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Size of the reservation in bytes (a page multiple)
    #[inline]
    pub fn reserved_len(&self) -> usize {
        self.reserved
    }

    /// Number of bytes, from the base, that are committed
    #[inline]
    pub fn committed_len(&self) -> usize {
        self.committed
    }

    /// Returns true if `ptr` lies inside the reservation
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        let base = self.base.as_ptr() as usize;
        addr >= base && addr - base < self.reserved
    }
}

impl fmt::Debug for VirtualRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualRegion")
            .field("base", &self.base)
            .field("reserved", &self.reserved)
            .field("committed", &self.committed)
            .finish()
    }
}

impl Drop for VirtualRegion {
    fn drop(&mut self) {
        // SAFETY: `base`/`reserved` describe our reservation and this is the
        // only place that releases it.
        if let Err(error) = unsafe { free_address_space(self.base, self.reserved) } {
            warn!(%error, "failed to release virtual region");
        }
    }
}
