//! Integration tests for DoubleEndedStack allocator

use memrealm::allocator::{Allocator, DoubleEndedStackAllocator, StackConfig};
use memrealm::core::MemoryUsage;

const MIB: usize = 1024 * 1024;

#[test]
fn test_overlapping_back_allocation_is_rejected() {
    let mut allocator = DoubleEndedStackAllocator::new(MIB).expect("Failed to create allocator");
    allocator.alloc(MIB / 2, 16, 0).expect("Front allocation failed");

    let err = allocator.alloc_back(MIB / 2, 16, 4).unwrap_err();
    assert!(err.is_exhaustion());
    assert_eq!(allocator.back_used(), 0);
}

#[test]
fn test_ends_fill_the_block_without_overlap() {
    let mut allocator = DoubleEndedStackAllocator::new(4096).expect("Failed to create allocator");
    let mut front = Vec::new();
    let mut back = Vec::new();

    loop {
        let f = allocator.alloc_front(100, 8, 0);
        let b = allocator.alloc_back(100, 8, 0);
        match (f, b) {
            (Ok(f), Ok(b)) => {
                front.push(f);
                back.push(b);
            }
            (Ok(f), Err(_)) => front.push(f),
            (Err(_), Ok(b)) => back.push(b),
            (Err(_), Err(_)) => break,
        }
    }

    let highest_front = front
        .iter()
        .map(|p| p.as_ptr() as usize + 100)
        .max()
        .expect("front allocations");
    let lowest_back = back.iter().map(|p| p.as_ptr() as usize).min().expect("back allocations");
    assert!(highest_front <= lowest_back);
    assert_eq!(
        allocator.used_memory() + allocator.available_memory().expect("bounded"),
        4096
    );
}

#[test]
fn test_each_end_has_its_own_lifo_order() {
    let mut allocator =
        DoubleEndedStackAllocator::with_config(4096, StackConfig::debug())
            .expect("Failed to create allocator");

    let f1 = allocator.alloc_front(32, 8, 0).expect("front 1");
    let b1 = allocator.alloc_back(32, 8, 0).expect("back 1");
    let f2 = allocator.alloc_front(32, 8, 0).expect("front 2");
    let b2 = allocator.alloc_back(32, 8, 0).expect("back 2");

    // Interleaving across ends is fine as long as each end is LIFO.
    unsafe {
        allocator.dealloc_front(f2);
        allocator.dealloc_back(b2);
        allocator.dealloc_back(b1);
        allocator.dealloc_front(f1);
    }
    assert_eq!(allocator.front_used(), 0);
    assert_eq!(allocator.back_used(), 0);
}

#[test]
fn test_reset_reproduces_addresses_on_both_ends() {
    let mut allocator = DoubleEndedStackAllocator::new(4096).expect("Failed to create allocator");
    let run = |allocator: &mut DoubleEndedStackAllocator| {
        [
            allocator.alloc_front(10, 8, 0).expect("front"),
            allocator.alloc_back(20, 16, 0).expect("back"),
            allocator.alloc_front(30, 32, 4).expect("front"),
            allocator.alloc_back(40, 64, 4).expect("back"),
        ]
    };

    let first = run(&mut allocator);
    allocator.reset();
    let second = run(&mut allocator);
    assert_eq!(first, second);
}

#[test]
fn test_allocation_size_on_both_ends() {
    let mut allocator = DoubleEndedStackAllocator::new(1024).expect("Failed to create allocator");
    let front = allocator.alloc_front(11, 1, 0).expect("front");
    let back = allocator.alloc_back(22, 1, 0).expect("back");
    unsafe {
        assert_eq!(allocator.allocation_size(front), 11);
        assert_eq!(allocator.allocation_size(back), 22);
    }
}

#[test]
#[should_panic(expected = "was not allocated from the front end")]
fn test_back_pointer_freed_from_front_is_fatal() {
    let mut allocator = DoubleEndedStackAllocator::new(1024).expect("Failed to create allocator");
    let back = allocator.alloc_back(16, 8, 0).expect("back");
    unsafe { allocator.dealloc(back) };
}

#[test]
#[should_panic(expected = "stack allocations must be freed in LIFO order")]
fn test_out_of_order_back_free_is_fatal() {
    let mut allocator = DoubleEndedStackAllocator::new(1024).expect("Failed to create allocator");
    let first = allocator.alloc_back(16, 8, 0).expect("back 1");
    let _second = allocator.alloc_back(16, 8, 0).expect("back 2");
    unsafe { allocator.dealloc_back(first) };
}

#[test]
#[should_panic(expected = "is not in memory range")]
fn test_foreign_pointer_freed_from_front_is_fatal() {
    let mut allocator = DoubleEndedStackAllocator::new(4096).expect("Failed to create allocator");
    allocator.alloc_front(64, 8, 0).expect("Front allocation failed");

    let mut buffer = [0u8; 64];
    unsafe { allocator.dealloc_front(std::ptr::NonNull::from(&mut buffer).cast()) };
}

#[test]
#[should_panic(expected = "is not in memory range")]
fn test_foreign_pointer_freed_from_back_is_fatal() {
    let mut allocator = DoubleEndedStackAllocator::new(4096).expect("Failed to create allocator");
    allocator.alloc_back(64, 8, 0).expect("Back allocation failed");

    let mut buffer = [0u8; 64];
    unsafe { allocator.dealloc_back(std::ptr::NonNull::from(&mut buffer).cast()) };
}
