#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![allow(unsafe_code)] // Virtual memory management is FFI all the way down
//! # memrealm-system
//!
//! Cross-platform virtual memory primitives for the memrealm allocators.
//!
//! This crate provides:
//! - Address space reservation without physical backing
//! - Committing and decommitting physical memory inside a reservation
//! - Page size queries
//! - [`VirtualRegion`], an owned reservation released on drop
//!
//! ## Example
//!
//! ```
//! use memrealm_system::{VirtualRegion, page_size};
//!
//! fn main() -> memrealm_system::SystemResult<()> {
//!     // Reserve 64 pages, make the first 4 usable.
//!     let mut region = VirtualRegion::reserve(page_size() * 64)?;
//!     region.commit_to(page_size() * 4)?;
//!
//!     // SAFETY: the first four pages are committed.
//!     unsafe { region.base().as_ptr().write_bytes(0, page_size() * 4) };
//!     Ok(())
//! }
//! ```
pub mod error;
pub mod region;
pub mod utils;
pub mod virtual_memory;

// Re-exports
pub use error::{SystemError, SystemResult};
pub use region::VirtualRegion;
pub use virtual_memory::{
    commit_physical_memory, decommit_physical_memory, free_address_space, page_size,
    reserve_address_space, round_to_page,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
