//! Realm walkthrough
//!
//! Runs each allocator behind a checked realm and prints its statistics.
//! Set `RUST_LOG=memrealm=trace` to see every allocation.

use memrealm::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Memory Realm Demo ===\n");

    frame_scratch()?;
    stack_scopes()?;
    double_ended_split()?;
    object_pool()?;

    Ok(())
}

/// Per-frame scratch memory: allocate freely, reset once per frame
fn frame_scratch() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Linear ---");
    let mut realm = CheckedRealm::new(LinearAllocator::with_config(
        64 * 1024,
        LinearConfig::debug(),
    )?);

    for frame in 0..3 {
        for i in 0..100 {
            let ptr = realm.alloc(100, 16)?;
            unsafe { ptr.as_ptr().write_bytes(i as u8, 100) };
        }
        println!("frame {frame}: {} bytes used", realm.allocator().used());
        realm.reset();
    }

    println!("{}", realm.allocator().statistics());
    Ok(())
}

/// Nested scopes released in reverse order
fn stack_scopes() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Stack ---");
    let mut realm = CheckedRealm::new(StackAllocator::new(16 * 1024)?);

    let outer = realm.alloc(256, 8)?;
    let inner = realm.alloc(64, 32)?;
    println!("depth after two allocations: {}", realm.allocator().depth());

    unsafe {
        realm.dealloc(inner);
        realm.dealloc(outer);
    }
    println!("depth after releasing both: {}\n", realm.allocator().depth());
    Ok(())
}

/// Long-lived data from the front, short-lived from the back
fn double_ended_split() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Double-ended stack ---");
    let mut allocator = DoubleEndedStackAllocator::new(64 * 1024)?;

    let level = allocator.alloc_front(16 * 1024, 64, 0)?;
    let temp = allocator.alloc_back(4 * 1024, 16, 0)?;
    println!(
        "front {} bytes, back {} bytes, {} free",
        allocator.front_used(),
        allocator.back_used(),
        allocator.available()
    );

    unsafe {
        allocator.dealloc_back(temp);
        allocator.dealloc_front(level);
    }
    println!("after release: {} bytes used\n", allocator.used_memory());
    Ok(())
}

/// Fixed-size objects, freed in any order
fn object_pool() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Pool ---");
    const CANARY: usize = SimpleBoundsChecker::CANARY_SIZE;
    let pool = PoolAllocator::with_config(
        48 + 2 * CANARY,
        16,
        8,
        PoolConfig::debug().with_offset(CANARY),
    )?;
    let mut realm = CheckedRealm::new(pool);

    let ptrs = (0..8).map(|_| realm.alloc(48, 16)).collect::<Result<Vec<_>, _>>()?;
    match realm.alloc(48, 16) {
        Err(err) if err.is_exhaustion() => println!("ninth allocation refused: {err}"),
        other => println!("unexpected result: {other:?}"),
    }

    for ptr in ptrs.into_iter().step_by(2) {
        unsafe { realm.dealloc(ptr) };
    }
    println!("{} slots still live", realm.allocator().live());
    println!("{}", realm.allocator().statistics());
    Ok(())
}
