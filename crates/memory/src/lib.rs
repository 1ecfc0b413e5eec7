//! # memrealm
//!
//! Raw-memory allocators over OS virtual memory, and realms that wrap them
//! with overrun-detecting canaries.
//!
//! The crate provides:
//! - Linear, stack, double-ended stack, pool and growing pool allocators
//!   sharing one [`Allocator`] contract
//! - An intrusive [`FreeList`](free_list::FreeList)
//! - Pointer alignment helpers in [`utils`]
//! - [`MemoryRealm`], which pairs any allocator with a
//!   [`BoundsChecker`](bounds::BoundsChecker)
//!
//! ## Quick Start
//!
//! ```rust
//! use memrealm::prelude::*;
//!
//! let mut realm = CheckedRealm::new(PoolAllocator::with_config(
//!     64 + 8,
//!     16,
//!     32,
//!     PoolConfig::default().with_offset(4),
//! )?);
//!
//! let ptr = realm.alloc(64, 16)?;
//! unsafe {
//!     ptr.as_ptr().write_bytes(0x42, 64);
//!     realm.dealloc(ptr);
//! }
//! # Ok::<(), memrealm::AllocError>(())
//! ```
//!
//! ## Errors
//!
//! Running out of space is an [`AllocError`] the caller can handle. Breaking
//! an allocator's preconditions (bad alignment, foreign pointer, out-of-order
//! stack free) and canary corruption panic with a descriptive message.
//!
//! ## Threading
//!
//! Allocators take `&mut self` and do no locking. Share one across threads
//! only behind your own synchronization.
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for configs and statistics

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allocators are built on raw memory; every unsafe block carries a SAFETY note.
#![allow(unsafe_code)]
#![allow(clippy::must_use_candidate)]
// Header fields are u32 and every narrowing site is bounded by a validated capacity
#![allow(clippy::cast_possible_truncation)]

pub mod allocator;
pub mod bounds;
pub mod core;
pub mod error;
pub mod free_list;
pub mod realm;
pub mod utils;

pub use crate::allocator::Allocator;
pub use crate::error::{AllocError, AllocResult};
pub use crate::realm::{CheckedRealm, MemoryRealm, Realm, RetailRealm};

/// Convenient re-exports of commonly used types and traits
pub mod prelude {
    pub use crate::allocator::{
        Allocator, AllocatorStats, CapacityPolicy, DoubleEndedStackAllocator,
        GrowingPoolAllocator, GrowingPoolConfig, LinearAllocator, LinearConfig, PoolAllocator,
        PoolConfig, StackAllocator, StackConfig, StatisticsProvider,
    };
    pub use crate::bounds::{BoundsChecker, NoBoundsChecker, SimpleBoundsChecker};
    pub use crate::core::MemoryUsage;
    pub use crate::error::{AllocError, AllocResult};
    pub use crate::realm::{CheckedRealm, MemoryRealm, Realm, RetailRealm};
}

/// Version of the memrealm crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
