//! Stack (LIFO) allocators
//!
//! [`StackAllocator`] grows from the start of its block and rewinds on free.
//! [`DoubleEndedStackAllocator`] adds a second stack that grows down from the
//! end of the same block.

mod allocator;
mod config;
mod double_ended;

pub use allocator::StackAllocator;
pub use config::StackConfig;
pub use double_ended::DoubleEndedStackAllocator;
