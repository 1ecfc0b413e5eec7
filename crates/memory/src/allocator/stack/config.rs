//! Stack allocator configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for stack allocator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Verify on every free that the most recent allocation is the one being
    /// released
    pub lifo_checks: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for released memory (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            lifo_checks: true,
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl StackConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            lifo_checks: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            lifo_checks: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - minimal overhead, ordering still checked
    #[must_use]
    pub fn performance() -> Self {
        Self {
            track_stats: false,
            lifo_checks: true,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }
}
