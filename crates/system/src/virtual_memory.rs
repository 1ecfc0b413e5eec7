//! Virtual memory provider
//!
//! Thin wrappers over the OS primitives that split memory acquisition into two
//! steps: reserving a range of address space, and committing physical memory
//! to parts of it.
//!
//! - **Unix**: `mmap` / `mprotect` / `munmap` through libc
//! - **Windows**: `VirtualAlloc` / `VirtualFree` through winapi
//!
//! None of these functions round sizes. Callers pass page multiples, usually
//! obtained from [`round_to_page`]. Touching reserved but uncommitted memory
//! faults.
//!
//! # Safety
//!
//! Reserving is safe: it creates a fresh mapping and touches nothing else.
//! Committing, decommitting and freeing act on caller-supplied addresses and
//! are `unsafe`; callers must ensure:
//! 1. **Provenance**: the range lies inside a reservation made by
//!    [`reserve_address_space`] that has not been freed
//! 2. **Alignment**: the start address is page-aligned
//! 3. **Lifecycle**: each reservation is freed exactly once
//! 4. **Access**: nothing reads or writes a range after it is decommitted or freed

use std::io;
use std::ptr::NonNull;
use std::sync::OnceLock;

use tracing::trace;

use crate::error::{SystemError, SystemResult};

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the OS page size in bytes.
///
/// Queried once and cached for the lifetime of the process.
#[inline]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(query_page_size)
}

/// Rounds `size` up to the next multiple of [`page_size`].
///
/// Returns `None` if the rounded value does not fit in `usize`.
///
/// # Examples
///
/// ```
/// use memrealm_system::virtual_memory::{page_size, round_to_page};
///
/// let page = page_size();
/// assert_eq!(round_to_page(1), Some(page));
/// assert_eq!(round_to_page(page), Some(page));
/// assert_eq!(round_to_page(0), Some(0));
/// ```
#[inline]
pub fn round_to_page(size: usize) -> Option<usize> {
    size.checked_next_multiple_of(page_size())
}

/// Reserves `size` bytes of address space without physical backing.
///
/// The returned range is inaccessible until committed with
/// [`commit_physical_memory`].
pub fn reserve_address_space(size: usize) -> SystemResult<NonNull<u8>> {
    if size == 0 {
        return Err(SystemError::InvalidInput(
            "cannot reserve zero bytes of address space".into(),
        ));
    }

    let addr = os_reserve(size)
        .and_then(|ptr| NonNull::new(ptr).ok_or_else(|| io::Error::other("null mapping")))
        .map_err(|source| SystemError::Reserve { size, source })?;

    trace!(addr = addr.as_ptr() as usize, size, "reserved address space");
    Ok(addr)
}

/// Backs `[addr, addr + size)` with readable and writable physical memory.
///
/// Returns `addr` on success. Newly committed memory reads as zero.
///
/// # Safety
///
/// - `[addr, addr + size)` must lie inside a live reservation obtained from
///   [`reserve_address_space`]
/// - `addr` must be page-aligned
pub unsafe fn commit_physical_memory(addr: NonNull<u8>, size: usize) -> SystemResult<NonNull<u8>> {
    // SAFETY: forwarded from the caller's contract.
    unsafe { os_commit(addr.as_ptr(), size) }.map_err(|source| SystemError::Commit {
        addr: addr.as_ptr() as usize,
        size,
        source,
    })?;

    trace!(addr = addr.as_ptr() as usize, size, "committed physical memory");
    Ok(addr)
}

/// Drops the physical backing of `[addr, addr + size)` but keeps the
/// reservation. The range becomes inaccessible again.
///
/// # Safety
///
/// - `[addr, addr + size)` must lie inside a live reservation obtained from
///   [`reserve_address_space`]
/// - `addr` must be page-aligned
/// - nothing may access the range until it is committed again
pub unsafe fn decommit_physical_memory(addr: NonNull<u8>, size: usize) -> SystemResult<()> {
    // SAFETY: forwarded from the caller's contract.
    unsafe { os_decommit(addr.as_ptr(), size) }.map_err(|source| SystemError::Decommit {
        addr: addr.as_ptr() as usize,
        size,
        source,
    })?;

    trace!(addr = addr.as_ptr() as usize, size, "decommitted physical memory");
    Ok(())
}

/// Releases a whole reservation, including any committed memory inside it.
///
/// `size` must be the size passed to [`reserve_address_space`]. It is required
/// by `munmap` and ignored on Windows.
///
/// # Safety
///
/// - `addr` must be the base returned by [`reserve_address_space`] and must not
///   have been freed already
/// - nothing may access the range afterwards
pub unsafe fn free_address_space(addr: NonNull<u8>, size: usize) -> SystemResult<()> {
    // SAFETY: forwarded from the caller's contract.
    unsafe { os_free(addr.as_ptr(), size) }.map_err(|source| SystemError::Release {
        addr: addr.as_ptr() as usize,
        source,
    })?;

    trace!(addr = addr.as_ptr() as usize, size, "released address space");
    Ok(())
}

// ---------------------------------------------------------------------------
// Unix
// ---------------------------------------------------------------------------

#[cfg(any(target_os = "linux", target_os = "android"))]
const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

#[cfg(unix)]
fn query_page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(unix)]
fn os_reserve(size: usize) -> io::Result<*mut u8> {
    // SAFETY: FFI call to mmap with a null hint and no MAP_FIXED, so the kernel
    // picks a fresh range and no existing mapping is affected.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_NONE,
            RESERVE_FLAGS,
            -1, // fd
            0,  // offset
        )
    };

    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr.cast::<u8>())
    }
}

#[cfg(unix)]
unsafe fn os_commit(addr: *mut u8, size: usize) -> io::Result<()> {
    // SAFETY: the caller guarantees the range belongs to one of our reservations.
    let result = unsafe {
        libc::mprotect(
            addr.cast::<libc::c_void>(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
        )
    };

    if result == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

#[cfg(unix)]
unsafe fn os_decommit(addr: *mut u8, size: usize) -> io::Result<()> {
    // SAFETY: the caller guarantees the range belongs to one of our reservations.
    // Mapping fresh anonymous PROT_NONE pages over it with MAP_FIXED discards
    // the old pages while keeping the addresses reserved.
    let ptr = unsafe {
        libc::mmap(
            addr.cast::<libc::c_void>(),
            size,
            libc::PROT_NONE,
            RESERVE_FLAGS | libc::MAP_FIXED,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(unix)]
unsafe fn os_free(addr: *mut u8, size: usize) -> io::Result<()> {
    // SAFETY: the caller guarantees `addr`/`size` describe a reservation of ours.
    let result = unsafe { libc::munmap(addr.cast::<libc::c_void>(), size) };

    if result == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

#[cfg(windows)]
fn query_page_size() -> usize {
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

    // SAFETY: SYSTEM_INFO is plain data, so the all-zero value is valid, and
    // GetSystemInfo only writes into the struct we hand it.
    let info = unsafe {
        let mut info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&raw mut info);
        info
    };

    match info.dwPageSize as usize {
        0 => FALLBACK_PAGE_SIZE,
        size => size,
    }
}

#[cfg(windows)]
fn os_reserve(size: usize) -> io::Result<*mut u8> {
    use winapi::um::memoryapi::VirtualAlloc;
    use winapi::um::winnt::{MEM_RESERVE, PAGE_NOACCESS};

    // SAFETY: a null base address lets the OS choose a fresh range, so no
    // existing allocation is affected.
    let ptr = unsafe { VirtualAlloc(std::ptr::null_mut(), size, MEM_RESERVE, PAGE_NOACCESS) };

    if ptr.is_null() {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr.cast::<u8>())
    }
}

#[cfg(windows)]
unsafe fn os_commit(addr: *mut u8, size: usize) -> io::Result<()> {
    use winapi::um::memoryapi::VirtualAlloc;
    use winapi::um::winnt::{MEM_COMMIT, PAGE_READWRITE};

    // SAFETY: the caller guarantees the range belongs to one of our reservations.
    let ptr = unsafe {
        VirtualAlloc(
            addr.cast::<winapi::ctypes::c_void>(),
            size,
            MEM_COMMIT,
            PAGE_READWRITE,
        )
    };

    if ptr.is_null() { Err(io::Error::last_os_error()) } else { Ok(()) }
}

#[cfg(windows)]
unsafe fn os_decommit(addr: *mut u8, size: usize) -> io::Result<()> {
    use winapi::um::memoryapi::VirtualFree;
    use winapi::um::winnt::MEM_DECOMMIT;

    // SAFETY: the caller guarantees the range belongs to one of our reservations.
    let ok = unsafe { VirtualFree(addr.cast::<winapi::ctypes::c_void>(), size, MEM_DECOMMIT) };

    if ok == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

#[cfg(windows)]
unsafe fn os_free(addr: *mut u8, _size: usize) -> io::Result<()> {
    use winapi::um::memoryapi::VirtualFree;
    use winapi::um::winnt::MEM_RELEASE;

    // SAFETY: the caller guarantees `addr` is the base of one of our
    // reservations. MEM_RELEASE requires a size of zero.
    let ok = unsafe { VirtualFree(addr.cast::<winapi::ctypes::c_void>(), 0, MEM_RELEASE) };

    if ok == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

// ---------------------------------------------------------------------------
// Other targets
// ---------------------------------------------------------------------------

#[cfg(not(any(unix, windows)))]
fn query_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

#[cfg(not(any(unix, windows)))]
fn os_reserve(_size: usize) -> io::Result<*mut u8> {
    Err(io::ErrorKind::Unsupported.into())
}

#[cfg(not(any(unix, windows)))]
unsafe fn os_commit(_addr: *mut u8, _size: usize) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}

#[cfg(not(any(unix, windows)))]
unsafe fn os_decommit(_addr: *mut u8, _size: usize) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}

#[cfg(not(any(unix, windows)))]
unsafe fn os_free(_addr: *mut u8, _size: usize) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}
