//! Allocators
//!
//! Every allocator implements [`Allocator`]: `alloc(size, alignment, offset)`,
//! `dealloc`, `reset` and `allocation_size`. They differ in what `dealloc`
//! can release:
//!
//! | Allocator | Release |
//! |---|---|
//! | [`LinearAllocator`] | only by `reset` |
//! | [`StackAllocator`] | newest allocation first |
//! | [`DoubleEndedStackAllocator`] | newest first, independently per end |
//! | [`PoolAllocator`] | any slot, any order |
//! | [`GrowingPoolAllocator`] | any slot, any order, commits on demand |

mod header;
pub mod linear;
pub mod pool;
pub mod stack;
pub mod stats;
pub mod traits;

pub use linear::{LinearAllocator, LinearConfig};
pub use pool::{CapacityPolicy, GrowingPoolAllocator, GrowingPoolConfig, PoolAllocator, PoolConfig};
pub use stack::{DoubleEndedStackAllocator, StackAllocator, StackConfig};
pub use stats::{AllocatorStats, StatisticsProvider};
pub use traits::Allocator;

pub(crate) use stats::StatsTracker;
