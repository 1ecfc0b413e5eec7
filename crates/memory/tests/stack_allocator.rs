//! Integration tests for Stack allocator

use memrealm::allocator::{Allocator, StackAllocator, StackConfig};
use pretty_assertions::assert_eq;

#[test]
fn test_stack_allocator_lifo() {
    let mut allocator =
        StackAllocator::with_config(4096, StackConfig::debug())
            .expect("Failed to create stack allocator");

    unsafe {
        // Allocate in order: A, B, C
        let ptr_a = allocator.alloc(64, 8, 0).expect("Allocation A failed");
        let ptr_b = allocator.alloc(64, 8, 0).expect("Allocation B failed");
        let ptr_c = allocator.alloc(64, 8, 0).expect("Allocation C failed");

        ptr_a.as_ptr().write_bytes(0xAA, 64);
        ptr_b.as_ptr().write_bytes(0xBB, 64);
        ptr_c.as_ptr().write_bytes(0xCC, 64);

        assert_eq!(*ptr_a.as_ptr(), 0xAA);
        assert_eq!(*ptr_b.as_ptr(), 0xBB);
        assert_eq!(*ptr_c.as_ptr(), 0xCC);

        // Deallocate in LIFO order: C, B, A
        allocator.dealloc(ptr_c);
        allocator.dealloc(ptr_b);
        allocator.dealloc(ptr_a);
    }

    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_reset_reproduces_addresses() {
    let mut allocator = StackAllocator::new(4096).expect("Failed to create stack allocator");
    let first: Vec<_> = (1..=5)
        .map(|i| allocator.alloc(i * 10, 1 << i, 0).expect("Allocation failed"))
        .collect();
    allocator.reset();
    assert_eq!(allocator.depth(), 0);
    let second: Vec<_> = (1..=5)
        .map(|i| allocator.alloc(i * 10, 1 << i, 0).expect("Allocation failed"))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_allocation_size_and_offset() {
    let mut allocator = StackAllocator::new(4096).expect("Failed to create stack allocator");
    let ptr = allocator.alloc(48, 32, 4).expect("Allocation failed");
    assert_eq!((ptr.as_ptr() as usize + 4) % 32, 0);
    assert_eq!(unsafe { allocator.allocation_size(ptr) }, 48);
}

#[test]
fn test_exhaustion_is_recoverable() {
    let mut allocator = StackAllocator::new(256).expect("Failed to create stack allocator");
    let big = allocator.alloc(200, 1, 0).expect("Allocation failed");
    let err = allocator.alloc(100, 1, 0).unwrap_err();
    assert!(err.is_exhaustion());

    unsafe { allocator.dealloc(big) };
    allocator.alloc(100, 1, 0).expect("Allocation after free failed");
}

#[test]
#[should_panic(expected = "stack allocations must be freed in LIFO order")]
fn test_out_of_order_free_is_fatal() {
    let mut allocator = StackAllocator::new(1024).expect("Failed to create stack allocator");
    let first = allocator.alloc(16, 8, 0).expect("Allocation failed");
    let _second = allocator.alloc(16, 8, 0).expect("Allocation failed");
    unsafe { allocator.dealloc(first) };
}

#[test]
#[should_panic(expected = "is not in memory range")]
fn test_free_above_top_is_fatal() {
    let mut allocator = StackAllocator::new(1024).expect("Failed to create stack allocator");
    let ptr = allocator.alloc(16, 8, 0).expect("Allocation failed");
    unsafe {
        allocator.dealloc(ptr);
        // Already released: now above the stack top.
        allocator.dealloc(ptr);
    }
}
