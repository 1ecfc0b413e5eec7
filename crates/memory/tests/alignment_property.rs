//! Property tests for alignment helpers and allocator placement

use memrealm::allocator::{Allocator, LinearAllocator, StackAllocator};
use memrealm::utils::{align_bottom, align_top, is_aligned_to};
use proptest::prelude::*;

fn alignment() -> impl Strategy<Value = usize> {
    (0u32..13).prop_map(|shift| 1usize << shift)
}

proptest! {
    #[test]
    fn align_top_is_smallest_aligned_address_above(
        addr in 0usize..(1 << 40),
        alignment in alignment()
    ) {
        let top = align_top(addr, alignment);
        prop_assert!(top >= addr);
        prop_assert!(top - addr < alignment);
        prop_assert!(is_aligned_to(top, alignment));
    }

    #[test]
    fn align_bottom_is_largest_aligned_address_below(
        addr in any::<usize>(),
        alignment in alignment()
    ) {
        let bottom = align_bottom(addr, alignment);
        prop_assert!(bottom <= addr);
        prop_assert!(addr - bottom < alignment);
        prop_assert!(is_aligned_to(bottom, alignment));
    }

    #[test]
    fn aligned_addresses_are_fixed_points(multiple in 0usize..(1 << 30), alignment in alignment()) {
        let addr = multiple * alignment;
        prop_assert_eq!(align_top(addr, alignment), addr);
        prop_assert_eq!(align_bottom(addr, alignment), addr);
    }

    #[test]
    fn linear_places_offset_pointer_on_alignment(
        requests in prop::collection::vec((1usize..256, alignment(), 0usize..16), 1..32)
    ) {
        let mut allocator = LinearAllocator::new(256 * 1024).expect("Failed to create allocator");
        for (size, alignment, offset) in requests {
            let ptr = allocator.alloc(size, alignment, offset).expect("Allocation failed");
            prop_assert!(is_aligned_to(ptr.as_ptr() as usize + offset, alignment));
            prop_assert_eq!(unsafe { allocator.allocation_size(ptr) }, size);
        }
    }

    #[test]
    fn stack_allocations_never_overlap(
        requests in prop::collection::vec((1usize..128, alignment()), 1..32)
    ) {
        let mut allocator = StackAllocator::new(256 * 1024).expect("Failed to create allocator");
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (size, alignment) in requests {
            let ptr = allocator.alloc(size, alignment, 0).expect("Allocation failed");
            let start = ptr.as_ptr() as usize;
            prop_assert!(ranges.iter().all(|&(s, e)| start >= e || start + size <= s));
            ranges.push((start, start + size));
        }
    }
}
