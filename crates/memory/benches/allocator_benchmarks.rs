//! Allocator benchmarks
//!
//! Compares the allocators against each other and the system allocator

use std::alloc::Layout;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use memrealm::allocator::{
    Allocator, DoubleEndedStackAllocator, GrowingPoolAllocator, GrowingPoolConfig,
    LinearAllocator, LinearConfig, PoolAllocator, PoolConfig, StackAllocator, StackConfig,
};
use memrealm::realm::{CheckedRealm, RetailRealm};

/// Single allocation/deallocation cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");

    group.bench_function("linear_64b", |b| {
        let mut allocator =
            LinearAllocator::with_config(1024 * 1024, LinearConfig::production()).unwrap();
        b.iter(|| {
            let ptr = allocator.alloc(64, 8, 0).unwrap();
            allocator.reset();
            black_box(ptr);
        });
    });

    group.bench_function("stack_64b", |b| {
        let mut allocator =
            StackAllocator::with_config(1024 * 1024, StackConfig::production()).unwrap();
        b.iter(|| unsafe {
            let ptr = allocator.alloc(64, 8, 0).unwrap();
            allocator.dealloc(ptr);
            black_box(ptr);
        });
    });

    group.bench_function("double_ended_back_64b", |b| {
        let mut allocator =
            DoubleEndedStackAllocator::with_config(1024 * 1024, StackConfig::production()).unwrap();
        b.iter(|| unsafe {
            let ptr = allocator.alloc_back(64, 8, 0).unwrap();
            allocator.dealloc_back(ptr);
            black_box(ptr);
        });
    });

    group.bench_function("pool_64b", |b| {
        let mut allocator =
            PoolAllocator::with_config(64, 8, 1024, PoolConfig::production()).unwrap();
        b.iter(|| unsafe {
            let ptr = allocator.alloc(64, 8, 0).unwrap();
            allocator.dealloc(ptr);
            black_box(ptr);
        });
    });

    // System allocator (baseline)
    group.bench_function("system_64b", |b| {
        let layout = Layout::from_size_align(64, 8).unwrap();
        b.iter(|| unsafe {
            let ptr = std::alloc::alloc(layout);
            std::alloc::dealloc(ptr, layout);
            black_box(ptr);
        });
    });

    group.finish();
}

/// Batches of 100 allocations released together
fn bench_batch_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_allocations");
    group.throughput(Throughput::Elements(100));

    group.bench_function("linear_100x64b", |b| {
        let mut allocator =
            LinearAllocator::with_config(1024 * 1024, LinearConfig::production()).unwrap();
        b.iter(|| {
            for _ in 0..100 {
                black_box(allocator.alloc(64, 8, 0).unwrap());
            }
            allocator.reset();
        });
    });

    group.bench_function("pool_100x64b", |b| {
        let mut allocator =
            PoolAllocator::with_config(64, 8, 128, PoolConfig::production()).unwrap();
        b.iter(|| {
            for _ in 0..100 {
                black_box(allocator.alloc(64, 8, 0).unwrap());
            }
            allocator.reset();
        });
    });

    group.bench_function("growing_pool_100x64b", |b| {
        let mut allocator = GrowingPoolAllocator::with_config(
            64,
            8,
            16,
            128,
            GrowingPoolConfig::production(),
        )
        .unwrap();
        b.iter(|| {
            for _ in 0..100 {
                black_box(allocator.alloc(64, 8, 0).unwrap());
            }
            allocator.reset();
        });
    });

    group.finish();
}

/// Cost of canaries on top of the allocator
fn bench_realm_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("realm_overhead");

    for size in &[16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("checked", size), size, |b, &size| {
            let mut realm = CheckedRealm::new(
                StackAllocator::with_config(1024 * 1024, StackConfig::production()).unwrap(),
            );
            b.iter(|| unsafe {
                let ptr = realm.alloc(size, 16).unwrap();
                realm.dealloc(ptr);
                black_box(ptr);
            });
        });

        group.bench_with_input(BenchmarkId::new("retail", size), size, |b, &size| {
            let mut realm = RetailRealm::new(
                StackAllocator::with_config(1024 * 1024, StackConfig::production()).unwrap(),
            );
            b.iter(|| unsafe {
                let ptr = realm.alloc(size, 16).unwrap();
                realm.dealloc(ptr);
                black_box(ptr);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_allocations,
    bench_realm_overhead
);
criterion_main!(benches);
