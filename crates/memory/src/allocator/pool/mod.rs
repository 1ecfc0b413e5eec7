//! Pool allocators for fixed-size elements
//!
//! [`PoolAllocator`] carves a fixed number of slots out of one block.
//! [`GrowingPoolAllocator`] reserves room for a maximum number of slots and
//! commits them in batches as the pool fills.

mod allocator;
mod config;
mod growing;
mod layout;

pub use allocator::PoolAllocator;
pub use config::{CapacityPolicy, GrowingPoolConfig, PoolConfig};
pub use growing::GrowingPoolAllocator;
