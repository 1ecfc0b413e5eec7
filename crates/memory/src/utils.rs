//! Pointer alignment utilities
//!
//! All alignments are powers of two. Allocator entry points additionally accept
//! `0` as "no constraint" and map it to `1` through [`normalize_alignment`].

use crate::error::Misuse;

/// Checks if `n` is a power of two (zero is not)
#[inline(always)]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Maps `0` to `1` and panics on any other non-power-of-two alignment
#[inline(always)]
#[track_caller]
pub fn normalize_alignment(alignment: usize) -> usize {
    match alignment {
        0 => 1,
        a if is_power_of_two(a) => a,
        a => Misuse::InvalidAlignment { alignment: a }.raise(),
    }
}

#[inline(always)]
#[track_caller]
fn mask_for(alignment: usize) -> usize {
    if !is_power_of_two(alignment) {
        Misuse::InvalidAlignment { alignment }.raise();
    }
    alignment - 1
}

/// Rounds `addr` up to the next multiple of `alignment`
///
/// `addr + alignment - 1` must not overflow; use [`checked_align_top`] when it
/// might.
///
/// # Examples
///
/// ```
/// use memrealm::utils::align_top;
///
/// assert_eq!(align_top(0, 8), 0);
/// assert_eq!(align_top(1, 8), 8);
/// assert_eq!(align_top(17, 16), 32);
/// ```
#[inline(always)]
#[track_caller]
pub fn align_top(addr: usize, alignment: usize) -> usize {
    let mask = mask_for(alignment);
    (addr + mask) & !mask
}

/// Like [`align_top`], but returns `None` instead of overflowing
#[inline(always)]
#[track_caller]
pub fn checked_align_top(addr: usize, alignment: usize) -> Option<usize> {
    let mask = mask_for(alignment);
    addr.checked_add(mask).map(|v| v & !mask)
}

/// Rounds `addr` down to the previous multiple of `alignment`
///
/// # Examples
///
/// ```
/// use memrealm::utils::align_bottom;
///
/// assert_eq!(align_bottom(15, 8), 8);
/// assert_eq!(align_bottom(16, 8), 16);
/// ```
#[inline(always)]
#[track_caller]
pub fn align_bottom(addr: usize, alignment: usize) -> usize {
    addr & !mask_for(alignment)
}

/// True when `alignment` is zero or the low bits of `addr` are clear
///
/// `alignment` must be zero or a power of two.
#[inline(always)]
pub const fn is_aligned_to(addr: usize, alignment: usize) -> bool {
    alignment == 0 || addr & (alignment - 1) == 0
}

/// Rounds `value` up to a multiple of `multiple` (any non-zero value)
#[inline]
pub const fn checked_round_up(value: usize, multiple: usize) -> Option<usize> {
    value.checked_next_multiple_of(multiple)
}

/// Pointer form of [`align_top`] that keeps the pointer's provenance
#[inline(always)]
#[track_caller]
pub fn align_top_ptr(ptr: *mut u8, alignment: usize) -> *mut u8 {
    let addr = ptr as usize;
    ptr.wrapping_add(align_top(addr, alignment) - addr)
}

/// Pointer form of [`align_bottom`] that keeps the pointer's provenance
#[inline(always)]
#[track_caller]
pub fn align_bottom_ptr(ptr: *mut u8, alignment: usize) -> *mut u8 {
    let addr = ptr as usize;
    ptr.wrapping_sub(addr - align_bottom(addr, alignment))
}

/// Pointer form of [`is_aligned_to`]
#[inline(always)]
pub fn is_ptr_aligned_to(ptr: *const u8, alignment: usize) -> bool {
    is_aligned_to(ptr as usize, alignment)
}
