//! Pool allocator configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for pool allocator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for deallocated memory (for debugging)
    pub dealloc_pattern: Option<u8>,

    /// Alignment offset every request must use.
    ///
    /// Slots are laid out so that `ptr + offset` is aligned, which lets an
    /// outer layer such as a realm prepend `offset` bytes of its own.
    pub offset: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
            offset: 0,
        }
    }
}

impl PoolConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            offset: 0,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            offset: 0,
        }
    }

    /// Same configuration with a different alignment offset
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// What a growing pool does when every slot up to its maximum is in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CapacityPolicy {
    /// Return [`AllocError::CapacityExhausted`](crate::error::AllocError::CapacityExhausted)
    #[default]
    Fail,
    /// Log and panic
    Abort,
}

/// Configuration for growing pool allocator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrowingPoolConfig {
    /// Settings shared with the fixed pool
    pub pool: PoolConfig,

    /// Behaviour at maximum capacity
    pub capacity_policy: CapacityPolicy,
}

impl GrowingPoolConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            pool: PoolConfig::production(),
            capacity_policy: CapacityPolicy::Fail,
        }
    }

    /// Debug configuration - exhausting the pool is treated as a bug
    #[must_use]
    pub fn debug() -> Self {
        Self {
            pool: PoolConfig::debug(),
            capacity_policy: CapacityPolicy::Abort,
        }
    }
}
