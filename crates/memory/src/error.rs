//! Error types for allocator operations
//!
//! Failures fall into three classes:
//! - **Capacity exhaustion** is recoverable and returned as [`AllocError`]
//! - **Misuse** is a broken precondition (bad alignment, foreign pointer,
//!   out-of-order free) and panics through [`Misuse::raise`]
//! - **Corruption** found by a bounds checker panics through
//!   [`Corruption::raise`](crate::bounds::Corruption::raise)

use core::fmt;

use memrealm_system::SystemError;
use thiserror::Error;
use tracing::error;

/// Recoverable allocation failure
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AllocError {
    /// Not enough space left in a fixed-capacity allocator
    #[error(
        "out of memory: requested {requested} bytes aligned to {alignment}, {available} bytes available"
    )]
    OutOfMemory {
        /// Requested size in bytes
        requested: usize,
        /// Requested alignment
        alignment: usize,
        /// Bytes left between the cursor and the end of the block
        available: usize,
    },

    /// Every slot of a pool is in use
    #[error("pool exhausted: all {capacity} slots are in use")]
    CapacityExhausted {
        /// Maximum number of slots the pool can hand out
        capacity: usize,
    },

    /// Request size plus bookkeeping overflows `usize`
    #[error("size overflow: {size} bytes plus {overhead} bytes of overhead")]
    SizeOverflow {
        /// Requested size in bytes
        size: usize,
        /// Bytes added by the caller's layer
        overhead: usize,
    },

    /// Allocator parameters rejected at construction
    #[error("invalid allocator configuration: {reason}")]
    InvalidConfig {
        /// What was wrong
        reason: String,
    },

    /// The virtual memory provider failed
    #[error(transparent)]
    System(#[from] SystemError),
}

/// Result type for allocator operations
pub type AllocResult<T> = Result<T, AllocError>;

impl AllocError {
    pub(crate) fn out_of_memory(requested: usize, alignment: usize, available: usize) -> Self {
        Self::OutOfMemory {
            requested,
            alignment,
            available,
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns true if the allocator simply ran out of room.
    ///
    /// Exhaustion is the only failure a caller can meaningfully react to at
    /// allocation time, e.g. by resetting an arena or falling back to another
    /// allocator.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. } | Self::CapacityExhausted { .. })
    }
}

/// One of the two ends of a double-ended stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackEnd {
    /// The end that grows upward from the block start
    Front,
    /// The end that grows downward from the block end
    Back,
}

impl fmt::Display for StackEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Front => "front",
            Self::Back => "back",
        })
    }
}

/// A broken allocator precondition.
///
/// These are programming errors, never returned: [`Misuse::raise`] logs and
/// panics with the `Display` text, which stays stable so tests can match on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Misuse {
    /// Alignment that is neither zero nor a power of two
    #[error("alignment must be a power of two, got {alignment}")]
    InvalidAlignment {
        /// Offending alignment
        alignment: usize,
    },

    /// Pointer outside the allocator's live range
    #[error("pointer {addr:#x} is not in memory range [{begin:#x}, {end:#x})")]
    OutOfRange {
        /// Offending address
        addr: usize,
        /// Start of the live range
        begin: usize,
        /// End of the live range
        end: usize,
    },

    /// Pointer handed to the wrong end of a double-ended stack
    #[error("pointer {addr:#x} was not allocated from the {end} end")]
    WrongEnd {
        /// Offending address
        addr: usize,
        /// The end that was asked to free it
        end: StackEnd,
    },

    /// Stack allocation freed while a newer one is still live
    #[error(
        "stack allocations must be freed in LIFO order: expected allocation #{expected}, got #{found}"
    )]
    OutOfOrderFree {
        /// Id of the most recent live allocation
        expected: u32,
        /// Id stored in the freed allocation's header
        found: u32,
    },

    /// In-range pointer that does not start a pool slot
    #[error("pointer {addr:#x} is not a slot boundary")]
    NotSlotBoundary {
        /// Offending address
        addr: usize,
    },

    /// Pool free while every slot is already free
    #[error("pointer {addr:#x} freed while the pool has no live slots")]
    FreeWithoutLiveSlots {
        /// Offending address
        addr: usize,
    },

    /// Pool request larger than the element size
    #[error("requested {size} bytes exceed the pool element size of {max} bytes")]
    OversizedRequest {
        /// Requested size
        size: usize,
        /// Configured element size
        max: usize,
    },

    /// Pool request with stricter alignment than the slots provide
    #[error("requested alignment {alignment} exceeds the pool element alignment of {max}")]
    OveralignedRequest {
        /// Requested alignment
        alignment: usize,
        /// Configured element alignment
        max: usize,
    },

    /// Pool request with an offset the slots were not laid out for
    #[error("offset {offset} does not match the pool offset of {expected}")]
    OffsetMismatch {
        /// Requested offset
        offset: usize,
        /// Configured offset
        expected: usize,
    },

    /// Free-list chunk too small to hold a link
    #[error("chunk size {chunk_size} is smaller than a pointer ({min} bytes)")]
    ChunkTooSmall {
        /// Requested chunk size
        chunk_size: usize,
        /// Size of a pointer
        min: usize,
    },
}

impl Misuse {
    /// Logs the violation and panics.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn raise(self) -> ! {
        error!(misuse = %self, "allocator misuse");
        panic!("{self}");
    }
}
