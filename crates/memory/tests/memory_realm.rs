//! Integration tests for MemoryRealm
//!
//! Every allocator is driven through a checked realm: exact-size writes pass,
//! one byte past either edge is caught.

use memrealm::allocator::{
    Allocator, DoubleEndedStackAllocator, GrowingPoolAllocator, GrowingPoolConfig,
    LinearAllocator, PoolAllocator, PoolConfig, StackAllocator,
};
use memrealm::bounds::{BoundsChecker, SimpleBoundsChecker};
use memrealm::realm::{CheckedRealm, MemoryRealm, Realm, RetailRealm};
use rstest::rstest;

const CANARY: usize = SimpleBoundsChecker::CANARY_SIZE;

fn pool_for(bytes: usize, alignment: usize) -> PoolAllocator {
    PoolAllocator::with_config(
        bytes + 2 * CANARY,
        alignment,
        16,
        PoolConfig::default().with_offset(CANARY),
    )
    .expect("Failed to create pool")
}

fn exercise<A: Allocator>(realm: &mut CheckedRealm<A>, bytes: usize, alignment: usize) {
    let ptr = realm.alloc(bytes, alignment).expect("Realm allocation failed");
    assert_eq!(ptr.as_ptr() as usize % alignment, 0);
    unsafe {
        ptr.as_ptr().write_bytes(0x7F, bytes);
        assert_eq!(realm.allocation_size(ptr), bytes);
        realm.dealloc(ptr);
    }
}

#[rstest]
#[case(1, 1)]
#[case(24, 8)]
#[case(100, 16)]
#[case(1000, 64)]
fn test_exact_writes_pass_for_every_allocator(#[case] bytes: usize, #[case] alignment: usize) {
    exercise(
        &mut CheckedRealm::new(LinearAllocator::new(64 * 1024).expect("linear")),
        bytes,
        alignment,
    );
    exercise(
        &mut CheckedRealm::new(StackAllocator::new(64 * 1024).expect("stack")),
        bytes,
        alignment,
    );
    exercise(
        &mut CheckedRealm::new(DoubleEndedStackAllocator::new(64 * 1024).expect("double-ended")),
        bytes,
        alignment,
    );
    exercise(&mut CheckedRealm::new(pool_for(bytes, alignment)), bytes, alignment);
    exercise(
        &mut CheckedRealm::new(
            GrowingPoolAllocator::with_config(
                bytes + 2 * CANARY,
                alignment,
                2,
                8,
                GrowingPoolConfig {
                    pool: PoolConfig::default().with_offset(CANARY),
                    ..GrowingPoolConfig::default()
                },
            )
            .expect("growing pool"),
        ),
        bytes,
        alignment,
    );
}

#[test]
#[should_panic(expected = "back canary was not valid")]
fn test_overrun_by_one_byte_is_fatal() {
    let mut realm = CheckedRealm::new(StackAllocator::new(4096).expect("stack"));
    let ptr = realm.alloc(32, 8).expect("Realm allocation failed");
    unsafe {
        ptr.as_ptr().write_bytes(0, 33);
        realm.dealloc(ptr);
    }
}

#[test]
#[should_panic(expected = "front canary was not valid")]
fn test_underrun_by_one_byte_is_fatal() {
    let mut realm = CheckedRealm::new(pool_for(32, 8));
    let ptr = realm.alloc(32, 8).expect("Realm allocation failed");
    unsafe {
        ptr.as_ptr().sub(1).write(0);
        realm.dealloc(ptr);
    }
}

#[test]
fn test_custom_canary() {
    let checker = SimpleBoundsChecker::with_canary(0x1234_5678);
    let mut realm =
        MemoryRealm::with_bounds_checker(LinearAllocator::new(1024).expect("linear"), checker);
    let ptr = realm.alloc(8, 8).expect("Realm allocation failed");

    let front = unsafe { ptr.as_ptr().sub(CANARY).cast::<u32>().read_unaligned() };
    let back = unsafe { ptr.as_ptr().add(8).cast::<u32>().read_unaligned() };
    assert_eq!(front, 0x1234_5678);
    assert_eq!(back, 0x1234_5678);
}

#[test]
fn test_reset_delegates_to_allocator() {
    let mut realm = CheckedRealm::new(LinearAllocator::new(1024).expect("linear"));
    let first = realm.alloc(100, 16).expect("Realm allocation failed");
    realm.reset();
    let second = realm.alloc(100, 16).expect("Realm allocation failed");
    assert_eq!(first, second);
    assert!(realm.into_inner().used() >= 100 + 2 * CANARY);
}

#[test]
fn test_heterogeneous_realms() {
    let mut realms: Vec<Box<dyn Realm>> = vec![
        Box::new(CheckedRealm::new(LinearAllocator::new(4096).expect("linear"))),
        Box::new(RetailRealm::new(StackAllocator::new(4096).expect("stack"))),
        Box::new(CheckedRealm::new(pool_for(64, 8))),
    ];

    for realm in &mut realms {
        let ptr = realm.alloc(64, 8).expect("Realm allocation failed");
        unsafe {
            ptr.as_ptr().write_bytes(1, 64);
            realm.dealloc(ptr);
        }
        realm.reset();
    }
}

#[test]
fn test_heterogeneous_allocators_behind_one_realm_type() {
    let allocators: Vec<Box<dyn Allocator>> = vec![
        Box::new(LinearAllocator::new(4096).expect("linear")),
        Box::new(StackAllocator::new(4096).expect("stack")),
        Box::new(DoubleEndedStackAllocator::new(4096).expect("double-ended")),
    ];

    for allocator in allocators {
        let mut realm = CheckedRealm::new(allocator);
        exercise(&mut realm, 48, 16);
    }
}
