//! Intrusive free list
//!
//! A singly-linked list of equal-size chunks threaded through the chunks
//! themselves: the first pointer-sized bytes of every free chunk hold the
//! address of the next one, or null at the tail.
//!
//! ```text
//! head
//!  ↓
//! [next|....] → [next|....] → [next|....] → null
//! ```
//!
//! # Safety
//!
//! The list trusts its caller. Returning a chunk that is already free, or one
//! that never came from the list, corrupts it silently; detecting that is the
//! job of the allocator on top. Links are read and written unaligned, so any
//! chunk size of at least one pointer works.

use core::mem::size_of;
use core::ptr::{self, NonNull};

use crate::error::Misuse;

const LINK_SIZE: usize = size_of::<*mut u8>();

/// LIFO stack of free chunks
#[derive(Debug, Default)]
pub struct FreeList {
    head: Option<NonNull<u8>>,
}

// SAFETY: the list only links chunks inside memory owned by the allocator that
// owns the list; it moves between threads together with that memory.
unsafe impl Send for FreeList {}

impl FreeList {
    /// An empty list
    pub const fn empty() -> Self {
        Self { head: None }
    }

    /// Threads every whole `chunk_size` slot of `[begin, end)` into a list,
    /// in address order.
    ///
    /// Trailing bytes that do not fill a whole chunk are ignored.
    ///
    /// # Panics
    ///
    /// If `chunk_size` is smaller than a pointer.
    ///
    /// # Safety
    ///
    /// `[begin, end)` must be writable, unused by anything else, and remain
    /// valid for as long as chunks from this list are in circulation.
    #[track_caller]
    pub unsafe fn new(begin: NonNull<u8>, end: NonNull<u8>, chunk_size: usize) -> Self {
        check_chunk_size(chunk_size);
        let len = (end.as_ptr() as usize).saturating_sub(begin.as_ptr() as usize);
        // SAFETY: forwarded from the caller's contract; `len / chunk_size`
        // whole chunks fit in the range.
        unsafe { Self::with_count(begin, chunk_size, len / chunk_size) }
    }

    /// Threads `count` consecutive chunks of `chunk_size` bytes starting at
    /// `begin`.
    ///
    /// # Panics
    ///
    /// If `chunk_size` is smaller than a pointer.
    ///
    /// # Safety
    ///
    /// `[begin, begin + count * chunk_size)` must be writable, unused by
    /// anything else, and remain valid for as long as chunks from this list
    /// are in circulation.
    #[track_caller]
    pub unsafe fn with_count(begin: NonNull<u8>, chunk_size: usize, count: usize) -> Self {
        check_chunk_size(chunk_size);
        if count == 0 {
            return Self::empty();
        }

        let base = begin.as_ptr();
        for index in 0..count {
            // SAFETY: every chunk below `count` lies inside the caller's range
            // and is at least LINK_SIZE bytes long.
            unsafe {
                let chunk = base.add(index * chunk_size);
                let next = if index + 1 < count {
                    base.add((index + 1) * chunk_size)
                } else {
                    ptr::null_mut()
                };
                chunk.cast::<*mut u8>().write_unaligned(next);
            }
        }

        Self { head: Some(begin) }
    }

    /// Pops the head chunk, or `None` if the list is empty. O(1).
    #[inline]
    pub fn get_chunk(&mut self) -> Option<NonNull<u8>> {
        let chunk = self.head?;
        // SAFETY: every chunk on the list is at least LINK_SIZE bytes and its
        // first word holds the link written by `with_count` or `return_chunk`.
        let next = unsafe { chunk.as_ptr().cast::<*mut u8>().read_unaligned() };
        self.head = NonNull::new(next);
        Some(chunk)
    }

    /// Pushes `chunk` back onto the head. O(1).
    ///
    /// # Safety
    ///
    /// `chunk` must have been obtained from this list (or one threaded over the
    /// same memory with the same chunk size) and must not currently be on it.
    #[inline]
    pub unsafe fn return_chunk(&mut self, chunk: NonNull<u8>) {
        let next = self.head.map_or(ptr::null_mut(), NonNull::as_ptr);
        // SAFETY: the caller guarantees `chunk` is a full-size chunk we handed
        // out, so its first LINK_SIZE bytes are ours to overwrite.
        unsafe { chunk.as_ptr().cast::<*mut u8>().write_unaligned(next) };
        self.head = Some(chunk);
    }

    /// True if no chunk is available. O(1).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

#[inline]
#[track_caller]
fn check_chunk_size(chunk_size: usize) {
    if chunk_size < LINK_SIZE {
        Misuse::ChunkTooSmall {
            chunk_size,
            min: LINK_SIZE,
        }
        .raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(buffer: &mut [u8]) -> (NonNull<u8>, NonNull<u8>) {
        let len = buffer.len();
        let begin = NonNull::from(buffer).cast::<u8>();
        // SAFETY: one past the end of the buffer.
        (begin, unsafe { begin.add(len) })
    }

    #[test]
    fn test_chunks_come_out_in_address_order() {
        let mut buffer = [0u8; 64];
        let (begin, end) = range(&mut buffer);
        let mut list = unsafe { FreeList::new(begin, end, 16) };

        for index in 0..4 {
            let chunk = list.get_chunk().expect("chunk available");
            assert_eq!(chunk.as_ptr() as usize - begin.as_ptr() as usize, index * 16);
        }
        assert!(list.is_empty());
        assert_eq!(list.get_chunk(), None);
    }

    #[test]
    fn test_return_is_lifo() {
        let mut buffer = [0u8; 64];
        let (begin, end) = range(&mut buffer);
        let mut list = unsafe { FreeList::new(begin, end, 16) };

        let a = list.get_chunk().expect("chunk available");
        let b = list.get_chunk().expect("chunk available");
        unsafe {
            list.return_chunk(a);
            list.return_chunk(b);
        }
        assert_eq!(list.get_chunk(), Some(b));
        assert_eq!(list.get_chunk(), Some(a));
    }

    #[test]
    fn test_odd_chunk_size_and_trailing_bytes() {
        // 50 bytes of 12-byte chunks: 4 chunks, 2 leftover bytes, unaligned links.
        let mut buffer = [0u8; 50];
        let (begin, end) = range(&mut buffer);
        let mut list = unsafe { FreeList::new(begin, end, 12) };

        let mut count = 0;
        while list.get_chunk().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_range_smaller_than_a_chunk_is_empty() {
        let mut buffer = [0u8; 8];
        let (begin, end) = range(&mut buffer);
        let list = unsafe { FreeList::new(begin, end, 16) };
        assert!(list.is_empty());
    }

    #[test]
    fn test_return_to_empty_list() {
        let mut buffer = [0u8; 16];
        let (begin, _) = range(&mut buffer);
        let mut list = FreeList::empty();
        unsafe { list.return_chunk(begin) };
        assert!(!list.is_empty());
        assert_eq!(list.get_chunk(), Some(begin));
        assert!(list.is_empty());
    }

    #[test]
    #[should_panic(expected = "smaller than a pointer")]
    fn test_chunk_smaller_than_pointer_panics() {
        let mut buffer = [0u8; 16];
        let (begin, end) = range(&mut buffer);
        let _ = unsafe { FreeList::new(begin, end, 2) };
    }
}
