//! Core building blocks shared by the allocators
//!
//! - [`RawRegion`]: bounds-checked typed view over raw bytes
//! - [`MemoryBlock`]: a region plus who owns it
//! - [`MemoryUsage`]: capacity reporting

pub mod region;
pub mod traits;

pub use region::{MemoryBlock, Ownership, RawRegion};
pub use traits::MemoryUsage;
